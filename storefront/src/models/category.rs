// storefront/src/models/category.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub icon: Option<String>,
  pub min_price: i32,
  pub max_price: i32,
  pub created_at: DateTime<Utc>,
}
