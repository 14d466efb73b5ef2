// storefront/src/store/mod.rs

//! Persistence seam. `PgStore` is the production implementation; flows only
//! see `Arc<dyn Store>` so they can run against `MemoryStore` in tests.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use crate::errors::Result;
use crate::models::category::Category;
use crate::models::job_account::{JobAccount, JobFilter};
use crate::models::order::{Fulfilment, NewOrder, Order, OrderTarget, TransactionRow};
use crate::models::profile::{AppRole, UserWithRoles};
use crate::models::purchase::{Purchase, PurchaseView};
use crate::models::task::{DailyTask, TaskProgress};
use crate::models::ticket::{NewTicket, SupportTicket, TicketStatus};
use async_trait::async_trait;
use uuid::Uuid;

pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
  // --- Catalog ---
  async fn list_categories(&self) -> Result<Vec<Category>>;
  async fn list_job_accounts(&self, filter: &JobFilter) -> Result<Vec<JobAccount>>;
  async fn get_job_account(&self, id: Uuid) -> Result<Option<JobAccount>>;
  async fn update_total_stock(&self, id: Uuid, total_stock: i32) -> Result<Option<JobAccount>>;

  // --- Orders ---
  async fn insert_order(&self, order: NewOrder) -> Result<Order>;
  async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;
  /// Newest first.
  async fn orders_by_phone(&self, phone: &str) -> Result<Vec<Order>>;
  /// Newest first.
  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
  /// `pending` and `processing` orders, newest first.
  async fn open_transactions(&self) -> Result<Vec<TransactionRow>>;

  /// Stamps the provider's checkout id and moves `pending` → `processing`.
  /// Returns `false` if the order was not `pending`.
  async fn mark_processing(&self, order_id: Uuid, checkout_request_id: &str) -> Result<bool>;

  /// Moves a `pending`/`processing` order to `completed` and, in the same
  /// transaction, creates its purchase (when the order has a user) and bumps
  /// the job's `sold_count` by one. `None` if the order is unknown or already
  /// settled, in which case nothing changes.
  async fn complete_order(&self, target: &OrderTarget, receipt: Option<&str>) -> Result<Option<Fulfilment>>;

  /// Moves a `pending`/`processing` order to `failed`. `None` if unknown or already settled.
  async fn fail_order(&self, target: &OrderTarget) -> Result<Option<Order>>;

  // --- Purchases & daily tasks ---
  async fn purchases_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseView>>;
  async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>>;
  async fn tasks_for_job(&self, job_account_id: Uuid) -> Result<Vec<DailyTask>>;
  async fn progress_for_purchase(&self, purchase_id: Uuid) -> Result<Vec<TaskProgress>>;
  async fn complete_task(
    &self,
    user_id: Uuid,
    purchase_id: Uuid,
    task_id: Uuid,
    notes: Option<String>,
  ) -> Result<TaskProgress>;

  // --- Users ---
  async fn roles_for(&self, user_id: Uuid) -> Result<Vec<AppRole>>;
  async fn list_users(&self) -> Result<Vec<UserWithRoles>>;
  /// Removes the user's purchases, task progress, roles and profile, and
  /// unlinks their tickets and orders. `false` if no profile existed.
  async fn delete_user(&self, user_id: Uuid) -> Result<bool>;

  // --- Support tickets ---
  async fn insert_ticket(&self, ticket: NewTicket) -> Result<SupportTicket>;
  async fn attach_admin_message(&self, ticket_id: Uuid, message_id: i64) -> Result<()>;
  async fn ticket_by_admin_message(&self, message_id: i64) -> Result<Option<SupportTicket>>;
  async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>>;
  /// Stores the reply and sets status `replied`.
  async fn record_admin_reply(&self, ticket_id: Uuid, reply: &str) -> Result<Option<SupportTicket>>;
  async fn set_ticket_status(&self, ticket_id: Uuid, status: TicketStatus) -> Result<Option<SupportTicket>>;
  /// Newest first.
  async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<SupportTicket>>;
  /// Newest first.
  async fn tickets_for_user(&self, user_id: Uuid) -> Result<Vec<SupportTicket>>;
}
