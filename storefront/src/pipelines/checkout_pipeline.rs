// storefront/src/pipelines/checkout_pipeline.rs

//! Server-side checkout: validate the buyer form, create a `pending` order for
//! the job account's price, then hand off to the STK-push flow.

use crate::errors::{AppError, Result};
use crate::models::order::{short_id, NewOrder};
use crate::pipelines::contexts::{CheckoutCtx, StkPushCtx, StkPushInput};
use crate::validation;
use hatua::{Control, Flow, FlowCtx, FlowRegistry, Outcome, StepSpec};
use tracing::{info, instrument, warn};

pub fn register_checkout_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<CheckoutCtx, AppError>::new(
    "checkout",
    vec![
      StepSpec::required("validate_form"),
      StepSpec::required("load_job_account"),
      StepSpec::required("create_order"),
      StepSpec::required("request_payment"),
    ],
  );
  flow.on("validate_form", validate_form);
  flow.on("load_job_account", load_job_account);
  flow.on("create_order", create_order);
  flow.on("request_payment", request_payment);
  registry.register(flow);
}

#[instrument(name = "checkout::validate_form", skip(ctx), err)]
async fn validate_form(ctx: FlowCtx<CheckoutCtx>) -> Result<Control> {
  let form = ctx.snapshot(|c| c.form.clone());
  let name = validation::customer_name(&form.name)?;
  let phone = validation::checkout_phone(&form.phone)?;
  let email = validation::optional_email(form.email.as_deref())?;
  ctx.update(|c| {
    c.customer_name = name;
    c.customer_phone = phone;
    c.customer_email = email;
  });
  Ok(Control::Next)
}

#[instrument(name = "checkout::load_job_account", skip(ctx), err)]
async fn load_job_account(ctx: FlowCtx<CheckoutCtx>) -> Result<Control> {
  let (store, job_id) = ctx.snapshot(|c| (c.app_state.store.clone(), c.form.job_account_id));
  let job = store
    .get_job_account(job_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Job account not found".to_string()))?;
  if !job.can_be_sold() {
    return Err(AppError::Conflict("This job account is sold out".to_string()));
  }
  ctx.update(|c| c.job = Some(job));
  Ok(Control::Next)
}

#[instrument(name = "checkout::create_order", skip(ctx), err)]
async fn create_order(ctx: FlowCtx<CheckoutCtx>) -> Result<Control> {
  let (store, new_order) = ctx.snapshot(|c| {
    let job = c.job.as_ref();
    (
      c.app_state.store.clone(),
      job.map(|job| NewOrder {
        customer_name: c.customer_name.clone(),
        customer_phone: c.customer_phone.clone(),
        customer_email: c.customer_email.clone(),
        user_id: c.user_id,
        job_account_id: job.id,
        amount: job.price,
      }),
    )
  });
  let new_order = new_order.ok_or_else(|| AppError::Internal("Job account not loaded".to_string()))?;

  let order = store.insert_order(new_order).await?;
  info!(
    order = %short_id(&order.id),
    phone = %validation::mask_phone(&order.customer_phone),
    amount = order.amount,
    "Order created."
  );
  ctx.update(|c| c.order = Some(order));
  Ok(Control::Next)
}

#[instrument(name = "checkout::request_payment", skip(ctx), err)]
async fn request_payment(ctx: FlowCtx<CheckoutCtx>) -> Result<Control> {
  let (app_state, order, title) = ctx.snapshot(|c| {
    (
      c.app_state.clone(),
      c.order.clone(),
      c.job.as_ref().map(|j| j.title.clone()).unwrap_or_default(),
    )
  });
  let order = order.ok_or_else(|| AppError::Internal("Order not created".to_string()))?;

  let input = StkPushInput {
    phone: Some(order.customer_phone.clone()),
    amount: Some(serde_json::Value::from(order.amount)),
    order_id: Some(order.id.to_string()),
    account_reference: Some(format!("RWM-{}", short_id(&order.id))),
    transaction_desc: Some(format!("Payment for {}", title)),
  };
  let stk_ctx = FlowCtx::new(StkPushCtx::new(app_state.clone(), input));

  match app_state.flows.run(stk_ctx.clone()).await {
    Ok(Outcome::Finished) => {
      let ack = stk_ctx.read().ack.clone();
      ctx.update(|c| c.ack = ack);
      Ok(Control::Next)
    }
    Ok(Outcome::Halted) => Err(AppError::Internal("STK push did not complete".to_string())),
    Err(e) => {
      warn!(order = %short_id(&order.id), error = %e, "STK push failed; order stays pending.");
      Err(e)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::order::PaymentStatus;
  use crate::pipelines::contexts::CheckoutForm;
  use crate::testing::TestApp;
  use uuid::Uuid;

  fn form(job_account_id: Uuid) -> CheckoutForm {
    CheckoutForm {
      name: "Wanjiku Kamau".into(),
      phone: "0712 345 678".into(),
      email: Some(" Wanjiku@Example.com ".into()),
      job_account_id,
    }
  }

  #[actix_rt::test]
  async fn checkout_creates_order_and_pushes_with_reference() {
    let app = TestApp::new();
    let job = app.store.add_job("Data Annotator", 2500, 5);
    let user = Uuid::new_v4();
    let ctx = FlowCtx::new(CheckoutCtx::new(app.state.clone(), Some(user), form(job.id)));

    let outcome = app.state.flows.run(ctx.clone()).await.unwrap();
    assert_eq!(outcome, Outcome::Finished);

    let order = ctx.read().order.clone().unwrap();
    assert_eq!(order.customer_phone, "254712345678");
    assert_eq!(order.customer_email.as_deref(), Some("wanjiku@example.com"));
    assert_eq!(order.user_id, Some(user));
    assert_eq!(order.amount, 2500);

    let sent = app.gateway.requests();
    assert_eq!(sent[0].account_reference, format!("RWM-{}", short_id(&order.id)));
    assert_eq!(sent[0].transaction_desc, "Payment for D");
    assert_eq!(app.order(order.id).await.payment_status, PaymentStatus::Processing);
  }

  #[actix_rt::test]
  async fn sold_out_job_is_refused_before_any_order() {
    let app = TestApp::new();
    let job = app.store.add_job("Transcriber", 1000, 0);
    let ctx = FlowCtx::new(CheckoutCtx::new(app.state.clone(), None, form(job.id)));

    let err = app.state.flows.run(ctx.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(ctx.read().order.is_none());
    assert!(app.gateway.requests().is_empty());
  }

  #[actix_rt::test]
  async fn gateway_outage_keeps_order_pending() {
    let app = TestApp::new();
    app.gateway.fail_next();
    let job = app.store.add_job("Chat Moderator", 1800, 3);
    let ctx = FlowCtx::new(CheckoutCtx::new(app.state.clone(), None, form(job.id)));

    let err = app.state.flows.run(ctx.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream { .. }));
    let order_id = ctx.read().order.as_ref().map(|o| o.id).unwrap();
    assert_eq!(app.order(order_id).await.payment_status, PaymentStatus::Pending);
  }
}
