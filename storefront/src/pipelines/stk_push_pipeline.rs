// storefront/src/pipelines/stk_push_pipeline.rs

//! validate → rate limit → prompt the phone → stamp the order `processing`.
//! A provider rejection or outage fails the run before the order is touched.

use crate::errors::{AppError, Result};
use crate::models::order::short_id;
use crate::pipelines::contexts::StkPushCtx;
use crate::rate_limit::Decision;
use crate::services::StkPushRequest;
use crate::validation;
use hatua::{Control, Flow, FlowCtx, FlowRegistry, StepSpec};
use serde_json::Value;
use tracing::{info, instrument, warn};

pub fn register_stk_push_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<StkPushCtx, AppError>::new(
    "stk_push",
    vec![
      StepSpec::required("validate_input"),
      StepSpec::required("check_rate_limit"),
      StepSpec::required("send_stk_push"),
      StepSpec::required("mark_order_processing"),
    ],
  );
  flow.on("validate_input", validate_input);
  flow.on("check_rate_limit", check_rate_limit);
  flow.on("send_stk_push", send_stk_push);
  flow.on("mark_order_processing", mark_order_processing);
  registry.register(flow);
}

fn is_missing(value: Option<&Value>) -> bool {
  match value {
    None | Some(Value::Null) | Some(Value::Bool(false)) => true,
    Some(Value::String(s)) => s.is_empty(),
    Some(Value::Number(n)) => n.as_f64() == Some(0.0),
    Some(_) => false,
  }
}

#[instrument(name = "stk_push::validate_input", skip(ctx), err)]
async fn validate_input(ctx: FlowCtx<StkPushCtx>) -> Result<Control> {
  let input = ctx.snapshot(|c| c.input.clone());

  let phone = input.phone.unwrap_or_default();
  let order_ref = input.order_id.unwrap_or_default();
  if phone.is_empty() || order_ref.is_empty() || is_missing(input.amount.as_ref()) {
    return Err(AppError::Validation("Missing required fields".to_string()));
  }

  validation::mpesa_phone(&phone)?;
  let amount = validation::stk_amount(input.amount.as_ref().unwrap_or(&Value::Null))?;
  let order_id = validation::order_reference(&order_ref)?;

  let request = StkPushRequest {
    phone,
    amount,
    account_reference: validation::account_reference(input.account_reference.as_deref().unwrap_or_default()),
    transaction_desc: validation::transaction_desc(input.transaction_desc.as_deref()),
  };
  ctx.update(|c| {
    c.order_id = Some(order_id);
    c.request = Some(request);
  });
  Ok(Control::Next)
}

#[instrument(name = "stk_push::check_rate_limit", skip(ctx), err)]
async fn check_rate_limit(ctx: FlowCtx<StkPushCtx>) -> Result<Control> {
  let (limiter, phone) = ctx.snapshot(|c| {
    (
      c.app_state.rate_limiter.clone(),
      c.request.as_ref().map(|r| r.phone.clone()).unwrap_or_default(),
    )
  });
  match limiter.check(&phone) {
    Decision::Allowed => Ok(Control::Next),
    Decision::Limited { retry_after } => {
      warn!(phone = %validation::mask_phone(&phone), retry_after, "Rate limit exceeded.");
      Err(AppError::RateLimited { retry_after })
    }
  }
}

#[instrument(name = "stk_push::send", skip(ctx), err)]
async fn send_stk_push(ctx: FlowCtx<StkPushCtx>) -> Result<Control> {
  let (gateway, request, order_id) = ctx.snapshot(|c| (c.app_state.gateway.clone(), c.request.clone(), c.order_id));
  let request = request.ok_or_else(|| AppError::Internal("STK request missing after validation".to_string()))?;
  info!(
    phone = %validation::mask_phone(&request.phone),
    amount = request.amount,
    order = %order_id.as_ref().map(short_id).unwrap_or_default(),
    "Sending STK push."
  );

  let ack = gateway.stk_push(&request).await?;
  ctx.update(|c| c.ack = Some(ack));
  Ok(Control::Next)
}

#[instrument(name = "stk_push::mark_order_processing", skip(ctx), err)]
async fn mark_order_processing(ctx: FlowCtx<StkPushCtx>) -> Result<Control> {
  let (store, order_id, checkout_id) = ctx.snapshot(|c| {
    (
      c.app_state.store.clone(),
      c.order_id,
      c.ack.as_ref().map(|a| a.checkout_request_id.clone()),
    )
  });
  let (Some(order_id), Some(checkout_id)) = (order_id, checkout_id) else {
    return Err(AppError::Internal("STK acknowledgement missing".to_string()));
  };

  let marked = store.mark_processing(order_id, &checkout_id).await?;
  if !marked {
    // The prompt already went out; the callback still settles whatever order carries this id.
    warn!(order = %short_id(&order_id), "Order was not pending; checkout id not stored.");
  }
  ctx.update(|c| c.order_marked = marked);
  Ok(Control::Next)
}
