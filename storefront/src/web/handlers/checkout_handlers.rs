// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use hatua::{FlowCtx, Outcome};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::order::short_id;
use crate::pipelines::contexts::{CheckoutCtx, CheckoutForm};
use crate::state::AppState;
use crate::web::extractors::OptionalUser;

#[instrument(
    name = "handler::checkout",
    skip(app_state, payload, user),
    fields(job_id = %payload.job_account_id, signed_in = user.0.is_some())
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CheckoutForm>,
  user: OptionalUser,
) -> Result<HttpResponse, AppError> {
  let ctx = FlowCtx::new(CheckoutCtx::new(
    app_state.get_ref().clone(),
    user.0.map(|u| u.user_id),
    payload.into_inner(),
  ));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Finished) => {
      let guard = ctx.read();
      let (Some(order), Some(ack)) = (guard.order.as_ref(), guard.ack.as_ref()) else {
        return Err(AppError::Internal("Checkout finished without an order".to_string()));
      };
      info!(order = %short_id(&order.id), "Checkout started; waiting for PIN entry.");
      Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "orderId": order.id,
        "checkoutRequestId": ack.checkout_request_id,
        "merchantRequestId": ack.merchant_request_id,
        "message": "Check your phone and enter your M-Pesa PIN to complete payment",
      })))
    }
    Ok(Outcome::Halted) => Err(AppError::Internal("Checkout was halted".to_string())),
    Err(e) => {
      warn!(error = %e, "Checkout failed.");
      Err(e)
    }
  }
}
