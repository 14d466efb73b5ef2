// storefront/src/models/job_account.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobAccount {
  pub id: Uuid,
  pub category_id: Option<Uuid>,
  pub title: String,
  pub description: String,
  pub company: Option<String>,
  pub image_url: Option<String>,
  pub monthly_earnings: Option<String>,
  pub skills_required: Option<Vec<String>>,
  /// Whole Kenyan shillings.
  pub price: i32,
  pub total_stock: i32,
  pub sold_count: i32,
  pub is_available: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl JobAccount {
  pub fn available_stock(&self) -> i32 {
    (self.total_stock - self.sold_count).max(0)
  }

  pub fn can_be_sold(&self) -> bool {
    self.is_available && self.available_stock() > 0
  }
}

/// A job account as the API returns it.
#[derive(Debug, Clone, Serialize)]
pub struct JobAccountView {
  #[serde(flatten)]
  pub job: JobAccount,
  pub available_stock: i32,
}

impl From<JobAccount> for JobAccountView {
  fn from(job: JobAccount) -> Self {
    let available_stock = job.available_stock();
    Self { job, available_stock }
  }
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
  pub category_id: Option<Uuid>,
  /// Already sanitised; matched case-insensitively against title, description and company.
  pub search: Option<String>,
  pub available_only: bool,
}

impl JobFilter {
  pub fn matches(&self, job: &JobAccount) -> bool {
    if let Some(category_id) = self.category_id {
      if job.category_id != Some(category_id) {
        return false;
      }
    }
    if self.available_only && !job.is_available {
      return false;
    }
    match &self.search {
      Some(term) if !term.is_empty() => {
        let term = term.to_lowercase();
        job.title.to_lowercase().contains(&term)
          || job.description.to_lowercase().contains(&term)
          || job.company.as_deref().is_some_and(|c| c.to_lowercase().contains(&term))
      }
      _ => true,
    }
  }
}
