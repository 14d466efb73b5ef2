// storefront/src/web/handlers/support_handlers.rs

use actix_web::{web, HttpResponse};
use hatua::{FlowCtx, Outcome};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::order::short_id;
use crate::pipelines::contexts::{SupportTicketCtx, SupportTicketForm};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[instrument(name = "handler::create_ticket", skip(app_state, user, payload), fields(user_id = %user.user_id))]
pub async fn create_ticket_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  payload: web::Json<SupportTicketForm>,
) -> Result<HttpResponse, AppError> {
  let ctx = FlowCtx::new(SupportTicketCtx::new(app_state.get_ref().clone(), user, payload.into_inner()));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Finished) => {
      let guard = ctx.read();
      let ticket = guard
        .ticket
        .as_ref()
        .ok_or_else(|| AppError::Internal("Ticket flow finished without a ticket".to_string()))?;
      info!(ticket = %short_id(&ticket.id), notified = guard.operator_notified, "Support ticket created.");
      Ok(HttpResponse::Ok().json(json!({ "success": true, "ticketId": ticket.id })))
    }
    Ok(Outcome::Halted) => Err(AppError::Internal("Ticket flow was halted".to_string())),
    Err(e) => {
      warn!(error = %e, "Support ticket failed.");
      Err(e)
    }
  }
}

#[instrument(name = "handler::my_tickets", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn my_tickets_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let tickets = app_state.store.tickets_for_user(user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "tickets": tickets })))
}
