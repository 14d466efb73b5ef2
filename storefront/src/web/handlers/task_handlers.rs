// storefront/src/web/handlers/task_handlers.rs

//! The buyer's side of a completed purchase: the 30-day program and progress.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::order::short_id;
use crate::models::purchase::Purchase;
use crate::models::task::merge_progress;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug, Default)]
pub struct CompleteTaskRequest {
  pub notes: Option<String>,
}

/// Someone else's purchase looks exactly like a missing one.
async fn owned_purchase(app_state: &AppState, user: &AuthenticatedUser, purchase_id: Uuid) -> Result<Purchase, AppError> {
  app_state
    .store
    .get_purchase(purchase_id)
    .await?
    .filter(|p| p.user_id == user.user_id)
    .ok_or_else(|| AppError::NotFound("Purchase not found".to_string()))
}

#[instrument(name = "handler::my_purchases", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn my_purchases_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let purchases = app_state.store.purchases_for_user(user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "purchases": purchases })))
}

#[instrument(
    name = "handler::purchase_tasks",
    skip(app_state, user, path),
    fields(user_id = %user.user_id, purchase = %short_id(path.as_ref()))
)]
pub async fn purchase_tasks_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let purchase = owned_purchase(&app_state, &user, path.into_inner()).await?;
  let tasks = match purchase.job_account_id {
    Some(job_id) => app_state.store.tasks_for_job(job_id).await?,
    None => Vec::new(),
  };
  let progress = app_state.store.progress_for_purchase(purchase.id).await?;
  let completed = progress.iter().filter(|p| p.completed_at.is_some()).count();

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "purchase": purchase,
    "tasks": merge_progress(tasks, progress),
    "completedCount": completed,
  })))
}

#[instrument(
    name = "handler::complete_task",
    skip(app_state, user, path, payload),
    fields(user_id = %user.user_id, task_id = %path.1)
)]
pub async fn complete_task_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  path: web::Path<(Uuid, Uuid)>,
  payload: Option<web::Json<CompleteTaskRequest>>,
) -> Result<HttpResponse, AppError> {
  let (purchase_id, task_id) = path.into_inner();
  let purchase = owned_purchase(&app_state, &user, purchase_id).await?;

  let belongs = match purchase.job_account_id {
    Some(job_id) => app_state.store.tasks_for_job(job_id).await?.iter().any(|t| t.id == task_id),
    None => false,
  };
  if !belongs {
    return Err(AppError::NotFound("Task not found".to_string()));
  }

  let notes = payload
    .and_then(|p| p.into_inner().notes)
    .map(|n| n.trim().to_string())
    .filter(|n| !n.is_empty());
  let progress = app_state
    .store
    .complete_task(user.user_id, purchase.id, task_id, notes)
    .await?;
  info!("Task marked completed.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "progress": progress })))
}
