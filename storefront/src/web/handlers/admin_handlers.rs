// storefront/src/web/handlers/admin_handlers.rs

//! Back-office routes. Every handler takes `AdminUser`, so a missing token is
//! 401 and a signed-in non-admin is 403 before any work is done.

use actix_web::{web, HttpResponse};
use hatua::{FlowCtx, Outcome};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job_account::{JobAccountView, JobFilter};
use crate::models::order::short_id;
use crate::models::ticket::TicketStatus;
use crate::pipelines::contexts::{AdminTicketReplyCtx, ApprovalCtx, ApprovalDecision};
use crate::state::AppState;
use crate::validation;
use crate::web::extractors::AdminUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
  #[serde(default)]
  pub receipt_number: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateRequest {
  pub total_stock: i32,
}

#[derive(Deserialize, Debug, Default)]
pub struct TicketListQuery {
  pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TicketReplyRequest {
  #[serde(default)]
  pub reply: String,
}

#[derive(Deserialize, Debug)]
pub struct TicketStatusRequest {
  pub status: String,
}

fn parse_status(raw: &str) -> Result<TicketStatus, AppError> {
  raw.parse::<TicketStatus>().map_err(AppError::Validation)
}

async fn run_approval(app_state: &AppState, ctx: FlowCtx<ApprovalCtx>) -> Result<(), AppError> {
  match app_state.flows.run(ctx).await {
    Ok(Outcome::Finished) => Ok(()),
    Ok(Outcome::Halted) => Err(AppError::Internal("Approval flow was halted".to_string())),
    Err(e) => {
      warn!(error = %e, "Approval flow failed.");
      Err(e)
    }
  }
}

// --- Transactions ---

#[instrument(name = "handler::admin_transactions", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn list_transactions_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let transactions = app_state.store.open_transactions().await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "transactions": transactions })))
}

#[instrument(
    name = "handler::admin_approve",
    skip(app_state, admin, path, payload),
    fields(admin_id = %admin.0.user_id, order = %short_id(path.as_ref()))
)]
pub async fn approve_transaction_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
  payload: web::Json<ApproveRequest>,
) -> Result<HttpResponse, AppError> {
  let receipt_number = validation::receipt_number(&payload.receipt_number)?;
  let ctx = FlowCtx::new(ApprovalCtx::new(
    app_state.get_ref().clone(),
    admin.0.user_id,
    path.into_inner(),
    ApprovalDecision::Approve { receipt_number },
  ));
  run_approval(&app_state, ctx.clone()).await?;

  let fulfilment = ctx
    .read()
    .fulfilment
    .clone()
    .ok_or_else(|| AppError::Internal("Approval finished without fulfilment".to_string()))?;
  info!(purchase_created = fulfilment.purchase_id.is_some(), "Transaction approved.");
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "Transaction approved",
    "order": fulfilment.order,
    "purchaseId": fulfilment.purchase_id,
  })))
}

#[instrument(
    name = "handler::admin_reject",
    skip(app_state, admin, path),
    fields(admin_id = %admin.0.user_id, order = %short_id(path.as_ref()))
)]
pub async fn reject_transaction_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let ctx = FlowCtx::new(ApprovalCtx::new(
    app_state.get_ref().clone(),
    admin.0.user_id,
    path.into_inner(),
    ApprovalDecision::Reject,
  ));
  run_approval(&app_state, ctx.clone()).await?;

  let order = ctx
    .read()
    .rejected
    .clone()
    .ok_or_else(|| AppError::Internal("Rejection finished without an order".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Transaction rejected", "order": order })))
}

// --- Stock ---

#[instrument(name = "handler::admin_stock", skip(app_state, _admin))]
pub async fn list_stock_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  let jobs: Vec<JobAccountView> = app_state
    .store
    .list_job_accounts(&JobFilter::default())
    .await?
    .into_iter()
    .map(JobAccountView::from)
    .collect();
  Ok(HttpResponse::Ok().json(json!({ "success": true, "jobs": jobs })))
}

#[instrument(
    name = "handler::admin_update_stock",
    skip(app_state, admin, path, payload),
    fields(admin_id = %admin.0.user_id, job_id = %path.as_ref())
)]
pub async fn update_stock_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
  payload: web::Json<StockUpdateRequest>,
) -> Result<HttpResponse, AppError> {
  let total_stock = validation::total_stock(payload.total_stock)?;
  let job = app_state
    .store
    .update_total_stock(path.into_inner(), total_stock)
    .await?
    .ok_or_else(|| AppError::NotFound("Job account not found".to_string()))?;
  info!(total_stock, sold = job.sold_count, "Stock updated.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "job": JobAccountView::from(job) })))
}

// --- Users ---

#[instrument(name = "handler::admin_users", skip(app_state, _admin))]
pub async fn list_users_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  let users = app_state.store.list_users().await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "users": users })))
}

#[instrument(
    name = "handler::admin_delete_user",
    skip(app_state, admin, path),
    fields(admin_id = %admin.0.user_id, target = %path.as_ref())
)]
pub async fn delete_user_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let user_id = path.into_inner();
  if user_id == admin.0.user_id {
    return Err(AppError::Validation("You cannot delete your own account".to_string()));
  }
  if !app_state.store.delete_user(user_id).await? {
    return Err(AppError::NotFound("User not found".to_string()));
  }
  info!("User deleted.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "User deleted" })))
}

// --- Tickets ---

#[instrument(name = "handler::admin_tickets", skip(app_state, _admin, query))]
pub async fn list_tickets_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  query: web::Query<TicketListQuery>,
) -> Result<HttpResponse, AppError> {
  let status = match query.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
    Some(raw) => Some(parse_status(raw)?),
    None => None,
  };
  let tickets = app_state.store.list_tickets(status).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "tickets": tickets })))
}

#[instrument(
    name = "handler::admin_ticket_reply",
    skip(app_state, admin, path, payload),
    fields(admin_id = %admin.0.user_id, ticket = %short_id(path.as_ref()))
)]
pub async fn reply_ticket_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
  payload: web::Json<TicketReplyRequest>,
) -> Result<HttpResponse, AppError> {
  let ctx = FlowCtx::new(AdminTicketReplyCtx::new(
    app_state.get_ref().clone(),
    path.into_inner(),
    payload.into_inner().reply,
  ));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Finished) => {
      let guard = ctx.read();
      Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "ticket": guard.ticket,
        "relayed": guard.relayed,
      })))
    }
    Ok(Outcome::Halted) => Err(AppError::Internal("Ticket reply was halted".to_string())),
    Err(e) => {
      warn!(error = %e, "Ticket reply failed.");
      Err(e)
    }
  }
}

#[instrument(
    name = "handler::admin_ticket_status",
    skip(app_state, _admin, path, payload),
    fields(ticket = %short_id(path.as_ref()))
)]
pub async fn update_ticket_status_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
  payload: web::Json<TicketStatusRequest>,
) -> Result<HttpResponse, AppError> {
  let status = parse_status(&payload.status)?;
  let ticket = app_state
    .store
    .set_ticket_status(path.into_inner(), status)
    .await?
    .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "ticket": ticket })))
}
