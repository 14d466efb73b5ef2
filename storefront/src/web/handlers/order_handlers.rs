// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::order::short_id;
use crate::state::AppState;
use crate::validation;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct OrderLookupRequest {
  pub phone: String,
}

/// Polled by the payment-pending page until the order settles.
#[instrument(name = "handler::get_order", skip(app_state, path), fields(order = %short_id(path.as_ref())))]
pub async fn get_order_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state
    .store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "order": order })))
}

#[instrument(name = "handler::lookup_orders", skip(app_state, payload))]
pub async fn lookup_orders_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<OrderLookupRequest>,
) -> Result<HttpResponse, AppError> {
  let phone = validation::checkout_phone(&payload.phone)?;
  let orders = app_state.store.orders_by_phone(&phone).await?;
  if orders.is_empty() {
    warn!(phone = %validation::mask_phone(&phone), "No orders for phone.");
  }
  info!(count = orders.len(), "Orders looked up by phone.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "orders": orders })))
}

#[instrument(name = "handler::my_orders", skip(app_state, user), fields(user_id = %user.user_id))]
pub async fn my_orders_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.store.orders_for_user(user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "orders": orders })))
}
