// storefront/src/web/handlers/catalog_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job_account::{JobAccountView, JobFilter};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize, Debug, Default)]
pub struct ListJobsQuery {
  pub category: Option<Uuid>,
  pub search: Option<String>,
  /// Only listings flagged available; defaults to every listing.
  pub available: Option<bool>,
}

#[instrument(name = "handler::list_categories", skip(app_state))]
pub async fn list_categories_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let categories = app_state.store.list_categories().await?;
  info!(count = categories.len(), "Categories fetched.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "categories": categories })))
}

#[instrument(name = "handler::list_jobs", skip(app_state, query))]
pub async fn list_jobs_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListJobsQuery>,
) -> Result<HttpResponse, AppError> {
  let query = query.into_inner();
  let search = match query.search.as_deref() {
    Some(raw) => Some(validation::search_query(raw)?).filter(|s| !s.is_empty()),
    None => None,
  };
  let filter = JobFilter {
    category_id: query.category,
    search,
    available_only: query.available.unwrap_or(false),
  };

  let jobs: Vec<JobAccountView> = app_state
    .store
    .list_job_accounts(&filter)
    .await?
    .into_iter()
    .map(JobAccountView::from)
    .collect();
  info!(count = jobs.len(), "Job accounts fetched.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "jobs": jobs })))
}

#[instrument(name = "handler::get_job", skip(app_state, path), fields(job_id = %path.as_ref()))]
pub async fn get_job_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
  let job_id = path.into_inner();
  match app_state.store.get_job_account(job_id).await? {
    Some(job) => Ok(HttpResponse::Ok().json(json!({ "success": true, "job": JobAccountView::from(job) }))),
    None => {
      warn!(%job_id, "Job account not found.");
      Err(AppError::NotFound("Job account not found".to_string()))
    }
  }
}
