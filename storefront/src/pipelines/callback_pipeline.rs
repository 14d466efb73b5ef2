// storefront/src/pipelines/callback_pipeline.rs

//! M-Pesa result notification: parse the envelope, then settle the order that
//! carries the checkout id. Settlement is conditional, so replays and late
//! notifications for already-settled orders change nothing.

use crate::errors::{AppError, Result};
use crate::models::order::{short_id, OrderTarget};
use crate::pipelines::contexts::{CallbackCtx, CallbackOutcome, StkCallback};
use hatua::{Control, Flow, FlowCtx, FlowRegistry, StepSpec};
use serde_json::Value;
use tracing::{info, instrument, warn};

pub fn register_callback_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<CallbackCtx, AppError>::new(
    "mpesa_callback",
    vec![
      StepSpec::required("parse_callback"),
      StepSpec::required("complete_order").skip_if(|c: &CallbackCtx| !c.is_success()),
      StepSpec::required("fail_order").skip_if(|c: &CallbackCtx| c.is_success()),
    ],
  );
  flow.on("parse_callback", parse_callback);
  flow.on("complete_order", complete_order);
  flow.on("fail_order", fail_order);
  registry.register(flow);
}

impl CallbackCtx {
  fn is_success(&self) -> bool {
    self.callback.as_ref().is_some_and(|cb| cb.result_code == 0)
  }
}

/// Reads `Body.stkCallback`. The receipt may arrive as a string or a number.
pub fn parse_stk_callback(payload: &Value) -> Option<StkCallback> {
  let cb = payload.get("Body")?.get("stkCallback")?;
  let checkout_request_id = cb.get("CheckoutRequestID")?.as_str()?.to_string();
  let result_code = match cb.get("ResultCode")? {
    Value::Number(n) => n.as_i64()?,
    Value::String(s) => s.trim().parse().ok()?,
    _ => return None,
  };
  let result_desc = cb
    .get("ResultDesc")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string();
  let receipt = cb
    .get("CallbackMetadata")
    .and_then(|m| m.get("Item"))
    .and_then(Value::as_array)
    .and_then(|items| {
      items
        .iter()
        .find(|item| item.get("Name").and_then(Value::as_str) == Some("MpesaReceiptNumber"))
    })
    .and_then(|item| match item.get("Value")? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    })
    .filter(|r| !r.is_empty());

  Some(StkCallback {
    checkout_request_id,
    result_code,
    result_desc,
    receipt,
  })
}

#[instrument(name = "mpesa_callback::parse", skip(ctx), err)]
async fn parse_callback(ctx: FlowCtx<CallbackCtx>) -> Result<Control> {
  let parsed = ctx.snapshot(|c| parse_stk_callback(&c.payload));
  match parsed {
    Some(callback) => {
      info!(
        checkout_id = %callback.checkout_request_id,
        result_code = callback.result_code,
        result_desc = %callback.result_desc,
        "M-Pesa callback received."
      );
      ctx.update(|c| c.callback = Some(callback));
      Ok(Control::Next)
    }
    None => {
      warn!("M-Pesa callback without a readable stkCallback envelope; ignoring.");
      ctx.update(|c| c.outcome = Some(CallbackOutcome::Ignored));
      Ok(Control::Halt)
    }
  }
}

fn target_of(ctx: &FlowCtx<CallbackCtx>) -> Result<(OrderTarget, Option<String>)> {
  ctx.snapshot(|c| {
    c.callback
      .as_ref()
      .map(|cb| (OrderTarget::CheckoutRequest(cb.checkout_request_id.clone()), cb.receipt.clone()))
      .ok_or_else(|| AppError::Internal("Callback not parsed".to_string()))
  })
}

#[instrument(name = "mpesa_callback::complete_order", skip(ctx), err)]
async fn complete_order(ctx: FlowCtx<CallbackCtx>) -> Result<Control> {
  let store = ctx.snapshot(|c| c.app_state.store.clone());
  let (target, receipt) = target_of(&ctx)?;

  let outcome = match store.complete_order(&target, receipt.as_deref()).await? {
    Some(fulfilment) => {
      info!(
        order = %short_id(&fulfilment.order.id),
        receipt = ?fulfilment.order.mpesa_receipt_number,
        "Payment completed via callback."
      );
      CallbackOutcome::Completed {
        order_id: fulfilment.order.id,
        purchase_created: fulfilment.purchase_id.is_some(),
      }
    }
    None => {
      info!(%target, "No open order for this checkout id; callback ignored.");
      CallbackOutcome::Ignored
    }
  };
  ctx.update(|c| c.outcome = Some(outcome));
  Ok(Control::Next)
}

#[instrument(name = "mpesa_callback::fail_order", skip(ctx), err)]
async fn fail_order(ctx: FlowCtx<CallbackCtx>) -> Result<Control> {
  let store = ctx.snapshot(|c| c.app_state.store.clone());
  let (target, _) = target_of(&ctx)?;

  let outcome = match store.fail_order(&target).await? {
    Some(order) => {
      info!(order = %short_id(&order.id), "Payment failed via callback.");
      CallbackOutcome::Failed { order_id: order.id }
    }
    None => {
      info!(%target, "No open order for this checkout id; callback ignored.");
      CallbackOutcome::Ignored
    }
  };
  ctx.update(|c| c.outcome = Some(outcome));
  Ok(Control::Next)
}
