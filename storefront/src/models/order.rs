// storefront/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

impl PaymentStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
  }

  /// Status only moves forward: pending → processing → {completed | failed},
  /// with pending allowed to settle directly.
  pub fn can_transition_to(self, next: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
      (self, next),
      (Pending, Processing) | (Pending, Completed) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Processing => "processing",
      PaymentStatus::Completed => "completed",
      PaymentStatus::Failed => "failed",
    }
  }
}

impl std::fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub customer_name: String,
  pub customer_phone: String,
  pub customer_email: Option<String>,
  pub user_id: Option<Uuid>,
  pub job_account_id: Option<Uuid>,
  /// Whole Kenyan shillings.
  pub amount: i32,
  pub payment_status: PaymentStatus,
  pub mpesa_checkout_request_id: Option<String>,
  pub mpesa_receipt_number: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
  pub customer_name: String,
  pub customer_phone: String,
  pub customer_email: Option<String>,
  pub user_id: Option<Uuid>,
  pub job_account_id: Uuid,
  pub amount: i32,
}

/// How a settlement finds its order: admins act on the order id, the
/// provider callback only knows its checkout-request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTarget {
  Id(Uuid),
  CheckoutRequest(String),
}

impl std::fmt::Display for OrderTarget {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OrderTarget::Id(id) => write!(f, "order {}", short_id(id)),
      OrderTarget::CheckoutRequest(checkout_id) => write!(f, "checkout {}", checkout_id),
    }
  }
}

/// Result of the one transition into `completed`.
#[derive(Debug, Clone)]
pub struct Fulfilment {
  pub order: Order,
  /// `None` for guest orders (no user to own a purchase).
  pub purchase_id: Option<Uuid>,
}

/// Admin transaction list row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionRow {
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub order: Order,
  pub job_title: Option<String>,
}

/// First eight characters of an id, for logs and customer-facing references.
pub fn short_id(id: &Uuid) -> String {
  id.to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
  use super::PaymentStatus::*;

  #[test]
  fn terminal_states_never_move() {
    for next in [Pending, Processing, Completed, Failed] {
      assert!(!Completed.can_transition_to(next));
      assert!(!Failed.can_transition_to(next));
    }
  }

  #[test]
  fn processing_cannot_go_back_to_pending() {
    assert!(!Processing.can_transition_to(Pending));
    assert!(!Processing.can_transition_to(Processing));
    assert!(Processing.can_transition_to(Completed));
    assert!(Pending.can_transition_to(Processing));
  }
}
