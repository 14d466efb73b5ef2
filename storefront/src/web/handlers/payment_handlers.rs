// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use hatua::{FlowCtx, Outcome};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::{CallbackCtx, StkPushCtx, StkPushInput};
use crate::state::AppState;

#[instrument(name = "handler::stk_push", skip(app_state, payload))]
pub async fn stk_push_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<StkPushInput>,
) -> Result<HttpResponse, AppError> {
  let ctx = FlowCtx::new(StkPushCtx::new(app_state.get_ref().clone(), payload.into_inner()));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Finished) => {
      let ack = ctx
        .read()
        .ack
        .clone()
        .ok_or_else(|| AppError::Internal("STK push finished without acknowledgement".to_string()))?;
      Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "STK Push sent successfully",
        "checkoutRequestId": ack.checkout_request_id,
        "merchantRequestId": ack.merchant_request_id,
      })))
    }
    Ok(Outcome::Halted) => Err(AppError::Internal("STK push was halted".to_string())),
    Err(e) => {
      warn!(error = %e, "STK push failed.");
      Err(e)
    }
  }
}

/// The provider retries anything but a 200, so every outcome is acknowledged
/// and failures only reach the logs.
#[instrument(name = "handler::mpesa_callback", skip(app_state, body), fields(bytes = body.len()))]
pub async fn mpesa_callback_handler(app_state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
  let ack = HttpResponse::Ok().json(json!({
    "ResultCode": 0,
    "ResultDesc": "Callback received successfully",
  }));

  let payload: serde_json::Value = match serde_json::from_slice(&body) {
    Ok(v) => v,
    Err(e) => {
      warn!(error = %e, "M-Pesa callback body is not JSON.");
      return ack;
    }
  };

  let ctx = FlowCtx::new(CallbackCtx::new(app_state.get_ref().clone(), payload));
  match app_state.flows.run(ctx.clone()).await {
    Ok(_) => info!(outcome = ?ctx.read().outcome, "M-Pesa callback processed."),
    Err(e) => error!(error = %e, "M-Pesa callback processing failed."),
  }
  ack
}
