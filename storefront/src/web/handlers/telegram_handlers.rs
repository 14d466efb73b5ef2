// storefront/src/web/handlers/telegram_handlers.rs

use actix_web::{web, HttpResponse};
use hatua::FlowCtx;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::TelegramUpdateCtx;
use crate::services::telegram::Update;
use crate::state::AppState;

/// Bot API retries non-2xx deliveries, so anything past the config check is
/// acknowledged and only logged, undecodable updates included.
#[instrument(name = "handler::telegram_webhook", skip(app_state, body), fields(bytes = body.len(), update_id = tracing::field::Empty))]
pub async fn telegram_webhook_handler(app_state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, AppError> {
  app_state.telegram()?;
  let ack = HttpResponse::Ok().json(json!({ "ok": true }));

  let update: Update = match serde_json::from_slice(&body) {
    Ok(update) => update,
    Err(e) => {
      warn!(error = %e, "Telegram update could not be decoded.");
      return Ok(ack);
    }
  };
  tracing::Span::current().record("update_id", update.update_id);

  let ctx = FlowCtx::new(TelegramUpdateCtx::new(app_state.get_ref().clone(), update));
  match app_state.flows.run(ctx.clone()).await {
    Ok(outcome) => info!(kind = ?ctx.read().kind, ?outcome, "Telegram update handled."),
    Err(e) => error!(error = %e, kind = ?ctx.read().kind, "Telegram update failed."),
  }
  Ok(ack)
}

#[instrument(name = "handler::telegram_setup_webhook", skip(app_state))]
pub async fn setup_webhook_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let (messenger, _) = app_state.telegram()?;
  let webhook_url = app_state
    .config
    .telegram
    .as_ref()
    .map(|t| t.webhook_url.clone())
    .ok_or_else(|| AppError::Config("Telegram not configured".to_string()))?;

  let status = messenger.set_webhook(&webhook_url).await?;
  if status.ok {
    info!(%webhook_url, "Telegram webhook registered.");
  } else {
    warn!(%webhook_url, description = ?status.description, "Telegram refused the webhook.");
  }
  Ok(HttpResponse::Ok().json(json!({
    "success": status.ok,
    "message": status.description,
    "webhook_url": webhook_url,
  })))
}
