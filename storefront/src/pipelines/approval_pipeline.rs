// storefront/src/pipelines/approval_pipeline.rs

//! Manual reconciliation by an operator. Approval settles the order through
//! the same conditional `complete_order` the callback uses, so whichever path
//! gets there first fulfils the order and the other is refused.

use crate::errors::{AppError, Result};
use crate::models::order::{short_id, OrderTarget};
use crate::pipelines::contexts::{ApprovalCtx, ApprovalDecision};
use hatua::{Control, Flow, FlowCtx, FlowRegistry, StepSpec};
use tracing::{info, instrument};

pub fn register_approval_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<ApprovalCtx, AppError>::new(
    "transaction_approval",
    vec![
      StepSpec::required("load_order"),
      StepSpec::required("approve").skip_if(|c: &ApprovalCtx| !c.is_approval()),
      StepSpec::required("reject").skip_if(|c: &ApprovalCtx| c.is_approval()),
    ],
  );
  flow.on("load_order", load_order);
  flow.on("approve", approve);
  flow.on("reject", reject);
  registry.register(flow);
}

fn already_settled(order_id: &uuid::Uuid) -> AppError {
  AppError::Conflict(format!("Order {} is already settled", short_id(order_id)))
}

#[instrument(name = "approval::load_order", skip(ctx), err)]
async fn load_order(ctx: FlowCtx<ApprovalCtx>) -> Result<Control> {
  let (store, order_id) = ctx.snapshot(|c| (c.app_state.store.clone(), c.order_id));
  let order = store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
  if order.payment_status.is_terminal() {
    return Err(already_settled(&order_id));
  }
  Ok(Control::Next)
}

#[instrument(name = "approval::approve", skip(ctx), err)]
async fn approve(ctx: FlowCtx<ApprovalCtx>) -> Result<Control> {
  let (store, order_id, admin_id, decision) =
    ctx.snapshot(|c| (c.app_state.store.clone(), c.order_id, c.admin_id, c.decision.clone()));
  let ApprovalDecision::Approve { receipt_number } = decision else {
    return Ok(Control::Next);
  };

  // Another path may have settled the order since load_order.
  let fulfilment = store
    .complete_order(&OrderTarget::Id(order_id), Some(&receipt_number))
    .await?
    .ok_or_else(|| already_settled(&order_id))?;
  info!(
    order = %short_id(&order_id),
    %admin_id,
    purchase_created = fulfilment.purchase_id.is_some(),
    "Transaction approved."
  );
  ctx.update(|c| c.fulfilment = Some(fulfilment));
  Ok(Control::Next)
}

#[instrument(name = "approval::reject", skip(ctx), err)]
async fn reject(ctx: FlowCtx<ApprovalCtx>) -> Result<Control> {
  let (store, order_id, admin_id) = ctx.snapshot(|c| (c.app_state.store.clone(), c.order_id, c.admin_id));
  let order = store
    .fail_order(&OrderTarget::Id(order_id))
    .await?
    .ok_or_else(|| already_settled(&order_id))?;
  info!(order = %short_id(&order_id), %admin_id, "Transaction rejected.");
  ctx.update(|c| c.rejected = Some(order));
  Ok(Control::Next)
}
