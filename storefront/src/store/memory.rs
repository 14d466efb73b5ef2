// storefront/src/store/memory.rs

//! In-memory `Store` used by flow and handler tests. Mirrors the conditional
//! updates of `PgStore` so settlement races behave the same way.

use super::Store;
use crate::errors::Result;
use crate::models::category::Category;
use crate::models::job_account::{JobAccount, JobFilter};
use crate::models::order::{Fulfilment, NewOrder, Order, OrderTarget, PaymentStatus, TransactionRow};
use crate::models::profile::{AppRole, Profile, UserWithRoles};
use crate::models::purchase::{Purchase, PurchaseStatus, PurchaseView, PURCHASE_VALIDITY_DAYS};
use crate::models::task::{DailyTask, TaskProgress, TaskStatus};
use crate::models::ticket::{NewTicket, SupportTicket, TicketStatus};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  categories: Vec<Category>,
  jobs: Vec<JobAccount>,
  orders: Vec<Order>,
  purchases: Vec<Purchase>,
  tasks: Vec<DailyTask>,
  progress: Vec<TaskProgress>,
  profiles: Vec<Profile>,
  roles: Vec<(Uuid, AppRole)>,
  tickets: Vec<SupportTicket>,
}

impl Tables {
  fn open_order_mut(&mut self, target: &OrderTarget) -> Option<&mut Order> {
    self
      .orders
      .iter_mut()
      .filter(|o| !o.payment_status.is_terminal())
      .find(|o| match target {
        OrderTarget::Id(id) => o.id == *id,
        OrderTarget::CheckoutRequest(checkout_id) => o.mpesa_checkout_request_id.as_deref() == Some(checkout_id),
      })
  }

  fn job_title(&self, id: Option<Uuid>) -> Option<String> {
    id.and_then(|id| self.jobs.iter().find(|j| j.id == id)).map(|j| j.title.clone())
  }
}

#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_category(&self, name: &str) -> Category {
    let category = Category {
      id: Uuid::new_v4(),
      name: name.to_string(),
      description: None,
      icon: None,
      min_price: 0,
      max_price: 0,
      created_at: Utc::now(),
    };
    self.tables.lock().categories.push(category.clone());
    category
  }

  pub fn add_job(&self, title: &str, price: i32, total_stock: i32) -> JobAccount {
    let now = Utc::now();
    let job = JobAccount {
      id: Uuid::new_v4(),
      category_id: None,
      title: title.to_string(),
      description: format!("{title} listing"),
      company: None,
      image_url: None,
      monthly_earnings: None,
      skills_required: None,
      price,
      total_stock,
      sold_count: 0,
      is_available: true,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().jobs.push(job.clone());
    job
  }

  pub fn set_job(&self, job: JobAccount) {
    let mut tables = self.tables.lock();
    tables.jobs.retain(|j| j.id != job.id);
    tables.jobs.push(job);
  }

  pub fn add_profile(&self, user_id: Uuid, full_name: &str) -> Profile {
    let now = Utc::now();
    let profile = Profile {
      id: Uuid::new_v4(),
      user_id,
      full_name: Some(full_name.to_string()),
      email: None,
      phone_number: None,
      county: None,
      is_registration_complete: Some(false),
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().profiles.push(profile.clone());
    profile
  }

  pub fn grant_role(&self, user_id: Uuid, role: AppRole) {
    self.tables.lock().roles.push((user_id, role));
  }

  pub fn add_task(&self, job_account_id: Uuid, day_number: i32) -> DailyTask {
    let task = DailyTask {
      id: Uuid::new_v4(),
      job_account_id,
      day_number,
      title: format!("Day {day_number}"),
      description: "Complete the assignment".into(),
      estimated_time: None,
      points: Some(10),
      created_at: Utc::now(),
    };
    self.tables.lock().tasks.push(task.clone());
    task
  }

  pub fn purchase_count(&self) -> usize {
    self.tables.lock().purchases.len()
  }

  pub fn all_tickets(&self) -> Vec<SupportTicket> {
    self.tables.lock().tickets.clone()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn list_categories(&self) -> Result<Vec<Category>> {
    let mut categories = self.tables.lock().categories.clone();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
  }

  async fn list_job_accounts(&self, filter: &JobFilter) -> Result<Vec<JobAccount>> {
    let tables = self.tables.lock();
    let mut jobs: Vec<JobAccount> = tables.jobs.iter().filter(|j| filter.matches(j)).cloned().collect();
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(jobs)
  }

  async fn get_job_account(&self, id: Uuid) -> Result<Option<JobAccount>> {
    Ok(self.tables.lock().jobs.iter().find(|j| j.id == id).cloned())
  }

  async fn update_total_stock(&self, id: Uuid, total_stock: i32) -> Result<Option<JobAccount>> {
    let mut tables = self.tables.lock();
    Ok(tables.jobs.iter_mut().find(|j| j.id == id).map(|job| {
      job.total_stock = total_stock;
      job.updated_at = Utc::now();
      job.clone()
    }))
  }

  async fn insert_order(&self, order: NewOrder) -> Result<Order> {
    let now = Utc::now();
    let row = Order {
      id: Uuid::new_v4(),
      customer_name: order.customer_name,
      customer_phone: order.customer_phone,
      customer_email: order.customer_email,
      user_id: order.user_id,
      job_account_id: Some(order.job_account_id),
      amount: order.amount,
      payment_status: PaymentStatus::Pending,
      mpesa_checkout_request_id: None,
      mpesa_receipt_number: None,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().orders.push(row.clone());
    Ok(row)
  }

  async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.tables.lock().orders.iter().find(|o| o.id == id).cloned())
  }

  async fn orders_by_phone(&self, phone: &str) -> Result<Vec<Order>> {
    let tables = self.tables.lock();
    Ok(tables.orders.iter().rev().filter(|o| o.customer_phone == phone).cloned().collect())
  }

  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let tables = self.tables.lock();
    Ok(tables.orders.iter().rev().filter(|o| o.user_id == Some(user_id)).cloned().collect())
  }

  async fn open_transactions(&self) -> Result<Vec<TransactionRow>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .orders
        .iter()
        .rev()
        .filter(|o| !o.payment_status.is_terminal())
        .map(|o| TransactionRow {
          order: o.clone(),
          job_title: tables.job_title(o.job_account_id),
        })
        .collect(),
    )
  }

  async fn mark_processing(&self, order_id: Uuid, checkout_request_id: &str) -> Result<bool> {
    let mut tables = self.tables.lock();
    match tables
      .orders
      .iter_mut()
      .find(|o| o.id == order_id && o.payment_status == PaymentStatus::Pending)
    {
      Some(order) => {
        order.mpesa_checkout_request_id = Some(checkout_request_id.to_string());
        order.payment_status = PaymentStatus::Processing;
        order.updated_at = Utc::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn complete_order(&self, target: &OrderTarget, receipt: Option<&str>) -> Result<Option<Fulfilment>> {
    let mut tables = self.tables.lock();
    let now = Utc::now();
    let Some(order) = tables.open_order_mut(target) else {
      return Ok(None);
    };
    order.payment_status = PaymentStatus::Completed;
    order.mpesa_receipt_number = receipt.map(str::to_string);
    order.updated_at = now;
    let order = order.clone();

    let mut purchase_id = None;
    if let Some(job_account_id) = order.job_account_id {
      if let Some(job) = tables.jobs.iter_mut().find(|j| j.id == job_account_id) {
        job.sold_count += 1;
      }
      let already = tables.purchases.iter().any(|p| p.order_id == Some(order.id));
      if let (Some(user_id), false) = (order.user_id, already) {
        let purchase = Purchase {
          id: Uuid::new_v4(),
          user_id,
          job_account_id: Some(job_account_id),
          order_id: Some(order.id),
          status: PurchaseStatus::PendingRegistration,
          purchase_date: now,
          start_date: now,
          end_date: now + Duration::days(PURCHASE_VALIDITY_DAYS),
          created_at: now,
          updated_at: now,
        };
        purchase_id = Some(purchase.id);
        tables.purchases.push(purchase);
      }
    }
    Ok(Some(Fulfilment { order, purchase_id }))
  }

  async fn fail_order(&self, target: &OrderTarget) -> Result<Option<Order>> {
    let mut tables = self.tables.lock();
    Ok(tables.open_order_mut(target).map(|order| {
      order.payment_status = PaymentStatus::Failed;
      order.updated_at = Utc::now();
      order.clone()
    }))
  }

  async fn purchases_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseView>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .purchases
        .iter()
        .rev()
        .filter(|p| p.user_id == user_id)
        .map(|p| PurchaseView {
          purchase: p.clone(),
          job_title: tables.job_title(p.job_account_id),
        })
        .collect(),
    )
  }

  async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
    Ok(self.tables.lock().purchases.iter().find(|p| p.id == id).cloned())
  }

  async fn tasks_for_job(&self, job_account_id: Uuid) -> Result<Vec<DailyTask>> {
    let tables = self.tables.lock();
    let mut tasks: Vec<DailyTask> = tables.tasks.iter().filter(|t| t.job_account_id == job_account_id).cloned().collect();
    tasks.sort_by_key(|t| t.day_number);
    Ok(tasks)
  }

  async fn progress_for_purchase(&self, purchase_id: Uuid) -> Result<Vec<TaskProgress>> {
    let tables = self.tables.lock();
    Ok(tables.progress.iter().filter(|p| p.purchase_id == purchase_id).cloned().collect())
  }

  async fn complete_task(
    &self,
    user_id: Uuid,
    purchase_id: Uuid,
    task_id: Uuid,
    notes: Option<String>,
  ) -> Result<TaskProgress> {
    let mut tables = self.tables.lock();
    let now = Utc::now();
    if let Some(existing) = tables
      .progress
      .iter_mut()
      .find(|p| p.purchase_id == purchase_id && p.task_id == task_id)
    {
      existing.status = TaskStatus::Completed;
      existing.completed_at = Some(now);
      existing.submission_notes = notes;
      return Ok(existing.clone());
    }
    let row = TaskProgress {
      id: Uuid::new_v4(),
      user_id,
      purchase_id,
      task_id,
      status: TaskStatus::Completed,
      completed_at: Some(now),
      submission_notes: notes,
      created_at: now,
    };
    tables.progress.push(row.clone());
    Ok(row)
  }

  async fn roles_for(&self, user_id: Uuid) -> Result<Vec<AppRole>> {
    let tables = self.tables.lock();
    Ok(tables.roles.iter().filter(|(u, _)| *u == user_id).map(|(_, r)| *r).collect())
  }

  async fn list_users(&self) -> Result<Vec<UserWithRoles>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .profiles
        .iter()
        .rev()
        .map(|profile| UserWithRoles {
          profile: profile.clone(),
          roles: tables
            .roles
            .iter()
            .filter(|(u, _)| *u == profile.user_id)
            .map(|(_, r)| *r)
            .collect(),
        })
        .collect(),
    )
  }

  async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
    let mut tables = self.tables.lock();
    if !tables.profiles.iter().any(|p| p.user_id == user_id) {
      return Ok(false);
    }
    tables.progress.retain(|p| p.user_id != user_id);
    tables.purchases.retain(|p| p.user_id != user_id);
    tables.roles.retain(|(u, _)| *u != user_id);
    tables.profiles.retain(|p| p.user_id != user_id);
    for ticket in tables.tickets.iter_mut().filter(|t| t.user_id == Some(user_id)) {
      ticket.user_id = None;
    }
    for order in tables.orders.iter_mut().filter(|o| o.user_id == Some(user_id)) {
      order.user_id = None;
    }
    Ok(true)
  }

  async fn insert_ticket(&self, ticket: NewTicket) -> Result<SupportTicket> {
    let now = Utc::now();
    let row = SupportTicket {
      id: Uuid::new_v4(),
      user_id: ticket.user_id,
      source: ticket.source,
      telegram_chat_id: ticket.telegram_chat_id,
      telegram_user_id: ticket.telegram_user_id,
      telegram_username: ticket.telegram_username,
      telegram_first_name: ticket.telegram_first_name,
      category: ticket.category,
      message: ticket.message,
      status: TicketStatus::Open,
      admin_message_id: None,
      admin_reply: None,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().tickets.push(row.clone());
    Ok(row)
  }

  async fn attach_admin_message(&self, ticket_id: Uuid, message_id: i64) -> Result<()> {
    let mut tables = self.tables.lock();
    if let Some(ticket) = tables.tickets.iter_mut().find(|t| t.id == ticket_id) {
      ticket.admin_message_id = Some(message_id);
    }
    Ok(())
  }

  async fn ticket_by_admin_message(&self, message_id: i64) -> Result<Option<SupportTicket>> {
    let tables = self.tables.lock();
    Ok(tables.tickets.iter().find(|t| t.admin_message_id == Some(message_id)).cloned())
  }

  async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>> {
    Ok(self.tables.lock().tickets.iter().find(|t| t.id == id).cloned())
  }

  async fn record_admin_reply(&self, ticket_id: Uuid, reply: &str) -> Result<Option<SupportTicket>> {
    let mut tables = self.tables.lock();
    Ok(tables.tickets.iter_mut().find(|t| t.id == ticket_id).map(|ticket| {
      ticket.admin_reply = Some(reply.to_string());
      ticket.status = TicketStatus::Replied;
      ticket.updated_at = Utc::now();
      ticket.clone()
    }))
  }

  async fn set_ticket_status(&self, ticket_id: Uuid, status: TicketStatus) -> Result<Option<SupportTicket>> {
    let mut tables = self.tables.lock();
    Ok(tables.tickets.iter_mut().find(|t| t.id == ticket_id).map(|ticket| {
      ticket.status = status;
      ticket.updated_at = Utc::now();
      ticket.clone()
    }))
  }

  async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<SupportTicket>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .tickets
        .iter()
        .rev()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .cloned()
        .collect(),
    )
  }

  async fn tickets_for_user(&self, user_id: Uuid) -> Result<Vec<SupportTicket>> {
    let tables = self.tables.lock();
    Ok(tables.tickets.iter().rev().filter(|t| t.user_id == Some(user_id)).cloned().collect())
  }
}
