// storefront/src/models/profile.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "app_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppRole {
  Admin,
  Moderator,
  User,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
  pub id: Uuid,
  pub user_id: Uuid,
  pub full_name: Option<String>,
  pub email: Option<String>,
  pub phone_number: Option<String>,
  pub county: Option<String>,
  pub is_registration_complete: Option<bool>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserWithRoles {
  #[serde(flatten)]
  pub profile: Profile,
  pub roles: Vec<AppRole>,
}
