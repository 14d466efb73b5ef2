// storefront/src/store/postgres.rs

use super::Store;
use crate::errors::Result;
use crate::models::category::Category;
use crate::models::job_account::{JobAccount, JobFilter};
use crate::models::order::{Fulfilment, NewOrder, Order, OrderTarget, TransactionRow};
use crate::models::profile::{AppRole, Profile, UserWithRoles};
use crate::models::purchase::{Purchase, PurchaseView, PURCHASE_VALIDITY_DAYS};
use crate::models::task::{DailyTask, TaskProgress};
use crate::models::ticket::{NewTicket, SupportTicket, TicketStatus};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, customer_email, user_id, job_account_id, amount, \
   payment_status, mpesa_checkout_request_id, mpesa_receipt_number, created_at, updated_at";

const JOB_COLUMNS: &str = "id, category_id, title, description, company, image_url, monthly_earnings, \
   skills_required, price, total_stock, sold_count, is_available, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, user_id, source, telegram_chat_id, telegram_user_id, telegram_username, \
   telegram_first_name, category, message, status, admin_message_id, admin_reply, created_at, updated_at";

const PURCHASE_COLUMNS: &str =
  "id, user_id, job_account_id, order_id, status, purchase_date, start_date, end_date, created_at, updated_at";

const PROGRESS_COLUMNS: &str =
  "id, user_id, purchase_id, task_id, status, completed_at, submission_notes, created_at";

const OPEN_STATUSES: &str = "('pending', 'processing')";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  fn order_filter(target: &OrderTarget) -> &'static str {
    match target {
      OrderTarget::Id(_) => "id = $1",
      OrderTarget::CheckoutRequest(_) => "mpesa_checkout_request_id = $1",
    }
  }

  async fn settle_order(
    tx: &mut Transaction<'_, Postgres>,
    target: &OrderTarget,
    set_clause: &str,
    receipt: Option<&str>,
  ) -> Result<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET {set_clause}, updated_at = now() \
       WHERE {filter} AND payment_status IN {OPEN_STATUSES} RETURNING {ORDER_COLUMNS}",
      filter = Self::order_filter(target),
    );
    let query = sqlx::query_as::<_, Order>(&sql);
    let query = match target {
      OrderTarget::Id(id) => query.bind(*id),
      OrderTarget::CheckoutRequest(checkout_id) => query.bind(checkout_id.clone()),
    };
    let query = if set_clause.contains("$2") { query.bind(receipt) } else { query };
    Ok(query.fetch_optional(&mut **tx).await?)
  }
}

#[async_trait]
impl Store for PgStore {
  async fn list_categories(&self) -> Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(
      "SELECT id, name, description, icon, min_price, max_price, created_at FROM categories ORDER BY name ASC",
    )
    .fetch_all(&self.pool)
    .await?;
    Ok(rows)
  }

  async fn list_job_accounts(&self, filter: &JobFilter) -> Result<Vec<JobAccount>> {
    let pattern = filter
      .search
      .as_deref()
      .filter(|s| !s.is_empty())
      .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));
    let sql = format!(
      "SELECT {JOB_COLUMNS} FROM job_accounts \
       WHERE ($1::uuid IS NULL OR category_id = $1) \
         AND ($2::text IS NULL OR title ILIKE $2 OR description ILIKE $2 OR company ILIKE $2) \
         AND (NOT $3 OR is_available) \
       ORDER BY created_at DESC"
    );
    let rows = sqlx::query_as::<_, JobAccount>(&sql)
      .bind(filter.category_id)
      .bind(pattern)
      .bind(filter.available_only)
      .fetch_all(&self.pool)
      .await?;
    Ok(rows)
  }

  async fn get_job_account(&self, id: Uuid) -> Result<Option<JobAccount>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM job_accounts WHERE id = $1");
    Ok(sqlx::query_as::<_, JobAccount>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn update_total_stock(&self, id: Uuid, total_stock: i32) -> Result<Option<JobAccount>> {
    let sql = format!("UPDATE job_accounts SET total_stock = $2, updated_at = now() WHERE id = $1 RETURNING {JOB_COLUMNS}");
    Ok(
      sqlx::query_as::<_, JobAccount>(&sql)
        .bind(id)
        .bind(total_stock)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn insert_order(&self, order: NewOrder) -> Result<Order> {
    let sql = format!(
      "INSERT INTO orders (customer_name, customer_phone, customer_email, user_id, job_account_id, amount, payment_status) \
       VALUES ($1, $2, $3, $4, $5, $6, 'pending') RETURNING {ORDER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, Order>(&sql)
      .bind(order.customer_name)
      .bind(order.customer_phone)
      .bind(order.customer_email)
      .bind(order.user_id)
      .bind(order.job_account_id)
      .bind(order.amount)
      .fetch_one(&self.pool)
      .await?;
    Ok(row)
  }

  async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn orders_by_phone(&self, phone: &str) -> Result<Vec<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE customer_phone = $1 ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, Order>(&sql).bind(phone).fetch_all(&self.pool).await?)
  }

  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, Order>(&sql).bind(user_id).fetch_all(&self.pool).await?)
  }

  async fn open_transactions(&self) -> Result<Vec<TransactionRow>> {
    let columns = ORDER_COLUMNS
      .split(", ")
      .map(|c| format!("o.{}", c))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "SELECT {columns}, j.title AS job_title FROM orders o \
       LEFT JOIN job_accounts j ON j.id = o.job_account_id \
       WHERE o.payment_status IN {OPEN_STATUSES} ORDER BY o.created_at DESC"
    );
    Ok(sqlx::query_as::<_, TransactionRow>(&sql).fetch_all(&self.pool).await?)
  }

  #[instrument(name = "store::mark_processing", skip(self))]
  async fn mark_processing(&self, order_id: Uuid, checkout_request_id: &str) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE orders SET mpesa_checkout_request_id = $2, payment_status = 'processing', updated_at = now() \
       WHERE id = $1 AND payment_status = 'pending'",
    )
    .bind(order_id)
    .bind(checkout_request_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  #[instrument(name = "store::complete_order", skip(self, receipt), fields(target = %target))]
  async fn complete_order(&self, target: &OrderTarget, receipt: Option<&str>) -> Result<Option<Fulfilment>> {
    let mut tx = self.pool.begin().await?;

    let Some(order) = Self::settle_order(
      &mut tx,
      target,
      "payment_status = 'completed', mpesa_receipt_number = $2",
      receipt,
    )
    .await?
    else {
      tx.rollback().await?;
      debug!("Order unknown or already settled; nothing to complete.");
      return Ok(None);
    };

    let mut purchase_id = None;
    if let Some(job_account_id) = order.job_account_id {
      sqlx::query("UPDATE job_accounts SET sold_count = sold_count + 1, updated_at = now() WHERE id = $1")
        .bind(job_account_id)
        .execute(&mut *tx)
        .await?;

      if let Some(user_id) = order.user_id {
        purchase_id = sqlx::query_scalar::<_, Uuid>(
          "INSERT INTO user_purchases (user_id, job_account_id, order_id, status, start_date, end_date) \
           VALUES ($1, $2, $3, 'pending_registration', now(), now() + make_interval(days => $4)) \
           ON CONFLICT (order_id) DO NOTHING RETURNING id",
        )
        .bind(user_id)
        .bind(job_account_id)
        .bind(order.id)
        .bind(PURCHASE_VALIDITY_DAYS as i32)
        .fetch_optional(&mut *tx)
        .await?;
      }
    }

    tx.commit().await?;
    info!(order_id = %order.id, purchase_created = purchase_id.is_some(), "Order completed.");
    Ok(Some(Fulfilment { order, purchase_id }))
  }

  #[instrument(name = "store::fail_order", skip(self), fields(target = %target))]
  async fn fail_order(&self, target: &OrderTarget) -> Result<Option<Order>> {
    let mut tx = self.pool.begin().await?;
    let order = Self::settle_order(&mut tx, target, "payment_status = 'failed'", None).await?;
    tx.commit().await?;
    Ok(order)
  }

  async fn purchases_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseView>> {
    let columns = PURCHASE_COLUMNS
      .split(", ")
      .map(|c| format!("p.{}", c))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "SELECT {columns}, j.title AS job_title FROM user_purchases p \
       LEFT JOIN job_accounts j ON j.id = p.job_account_id \
       WHERE p.user_id = $1 ORDER BY p.created_at DESC"
    );
    Ok(sqlx::query_as::<_, PurchaseView>(&sql).bind(user_id).fetch_all(&self.pool).await?)
  }

  async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
    let sql = format!("SELECT {PURCHASE_COLUMNS} FROM user_purchases WHERE id = $1");
    Ok(sqlx::query_as::<_, Purchase>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn tasks_for_job(&self, job_account_id: Uuid) -> Result<Vec<DailyTask>> {
    Ok(
      sqlx::query_as::<_, DailyTask>(
        "SELECT id, job_account_id, day_number, title, description, estimated_time, points, created_at \
         FROM daily_tasks WHERE job_account_id = $1 ORDER BY day_number ASC",
      )
      .bind(job_account_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn progress_for_purchase(&self, purchase_id: Uuid) -> Result<Vec<TaskProgress>> {
    let sql = format!("SELECT {PROGRESS_COLUMNS} FROM user_task_progress WHERE purchase_id = $1");
    Ok(sqlx::query_as::<_, TaskProgress>(&sql).bind(purchase_id).fetch_all(&self.pool).await?)
  }

  async fn complete_task(
    &self,
    user_id: Uuid,
    purchase_id: Uuid,
    task_id: Uuid,
    notes: Option<String>,
  ) -> Result<TaskProgress> {
    let sql = format!(
      "INSERT INTO user_task_progress (user_id, purchase_id, task_id, status, completed_at, submission_notes) \
       VALUES ($1, $2, $3, 'completed', now(), $4) \
       ON CONFLICT (purchase_id, task_id) DO UPDATE \
         SET status = 'completed', completed_at = now(), submission_notes = EXCLUDED.submission_notes \
       RETURNING {PROGRESS_COLUMNS}"
    );
    Ok(
      sqlx::query_as::<_, TaskProgress>(&sql)
        .bind(user_id)
        .bind(purchase_id)
        .bind(task_id)
        .bind(notes)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn roles_for(&self, user_id: Uuid) -> Result<Vec<AppRole>> {
    Ok(
      sqlx::query_scalar::<_, AppRole>("SELECT role FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn list_users(&self) -> Result<Vec<UserWithRoles>> {
    let profiles = sqlx::query_as::<_, Profile>(
      "SELECT id, user_id, full_name, email, phone_number, county, is_registration_complete, created_at, updated_at \
       FROM profiles ORDER BY created_at DESC",
    )
    .fetch_all(&self.pool)
    .await?;
    let role_rows = sqlx::query_as::<_, (Uuid, AppRole)>("SELECT user_id, role FROM user_roles")
      .fetch_all(&self.pool)
      .await?;

    let mut roles: HashMap<Uuid, Vec<AppRole>> = HashMap::new();
    for (user_id, role) in role_rows {
      roles.entry(user_id).or_default().push(role);
    }
    Ok(
      profiles
        .into_iter()
        .map(|profile| UserWithRoles {
          roles: roles.remove(&profile.user_id).unwrap_or_default(),
          profile,
        })
        .collect(),
    )
  }

  #[instrument(name = "store::delete_user", skip(self))]
  async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM user_task_progress WHERE user_id = $1").bind(user_id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM user_purchases WHERE user_id = $1").bind(user_id).execute(&mut *tx).await?;
    sqlx::query("UPDATE support_tickets SET user_id = NULL, updated_at = now() WHERE user_id = $1")
      .bind(user_id)
      .execute(&mut *tx)
      .await?;
    sqlx::query("UPDATE orders SET user_id = NULL, updated_at = now() WHERE user_id = $1")
      .bind(user_id)
      .execute(&mut *tx)
      .await?;
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1").bind(user_id).execute(&mut *tx).await?;
    let deleted = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
      .bind(user_id)
      .execute(&mut *tx)
      .await?
      .rows_affected();
    if deleted == 0 {
      tx.rollback().await?;
      return Ok(false);
    }
    tx.commit().await?;
    Ok(true)
  }

  async fn insert_ticket(&self, ticket: NewTicket) -> Result<SupportTicket> {
    let sql = format!(
      "INSERT INTO support_tickets (user_id, source, telegram_chat_id, telegram_user_id, telegram_username, \
         telegram_first_name, category, message, status) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'open') RETURNING {TICKET_COLUMNS}"
    );
    Ok(
      sqlx::query_as::<_, SupportTicket>(&sql)
        .bind(ticket.user_id)
        .bind(ticket.source)
        .bind(ticket.telegram_chat_id)
        .bind(ticket.telegram_user_id)
        .bind(ticket.telegram_username)
        .bind(ticket.telegram_first_name)
        .bind(ticket.category)
        .bind(ticket.message)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn attach_admin_message(&self, ticket_id: Uuid, message_id: i64) -> Result<()> {
    sqlx::query("UPDATE support_tickets SET admin_message_id = $2, updated_at = now() WHERE id = $1")
      .bind(ticket_id)
      .bind(message_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn ticket_by_admin_message(&self, message_id: i64) -> Result<Option<SupportTicket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM support_tickets WHERE admin_message_id = $1");
    Ok(sqlx::query_as::<_, SupportTicket>(&sql).bind(message_id).fetch_optional(&self.pool).await?)
  }

  async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = $1");
    Ok(sqlx::query_as::<_, SupportTicket>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn record_admin_reply(&self, ticket_id: Uuid, reply: &str) -> Result<Option<SupportTicket>> {
    let sql = format!(
      "UPDATE support_tickets SET admin_reply = $2, status = 'replied', updated_at = now() \
       WHERE id = $1 RETURNING {TICKET_COLUMNS}"
    );
    Ok(
      sqlx::query_as::<_, SupportTicket>(&sql)
        .bind(ticket_id)
        .bind(reply)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn set_ticket_status(&self, ticket_id: Uuid, status: TicketStatus) -> Result<Option<SupportTicket>> {
    let sql = format!("UPDATE support_tickets SET status = $2, updated_at = now() WHERE id = $1 RETURNING {TICKET_COLUMNS}");
    Ok(
      sqlx::query_as::<_, SupportTicket>(&sql)
        .bind(ticket_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<SupportTicket>> {
    let sql = format!(
      "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE ($1::ticket_status IS NULL OR status = $1) \
       ORDER BY created_at DESC"
    );
    Ok(sqlx::query_as::<_, SupportTicket>(&sql).bind(status).fetch_all(&self.pool).await?)
  }

  async fn tickets_for_user(&self, user_id: Uuid) -> Result<Vec<SupportTicket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM support_tickets WHERE user_id = $1 ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, SupportTicket>(&sql).bind(user_id).fetch_all(&self.pool).await?)
  }
}
