// storefront/src/models/purchase.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

/// Days a purchase stays valid after creation.
pub const PURCHASE_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "purchase_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
  PendingRegistration,
  Active,
  Completed,
  Expired,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Purchase {
  pub id: Uuid,
  pub user_id: Uuid,
  pub job_account_id: Option<Uuid>,
  pub order_id: Option<Uuid>,
  pub status: PurchaseStatus,
  pub purchase_date: DateTime<Utc>,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseView {
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub purchase: Purchase,
  pub job_title: Option<String>,
}
