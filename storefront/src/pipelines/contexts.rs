// storefront/src/pipelines/contexts.rs

//! Context structs for every registered flow. A handler builds one, wraps it
//! in `hatua::FlowCtx`, runs the registry and reads the results back out.

use crate::models::job_account::JobAccount;
use crate::models::order::{Fulfilment, Order};
use crate::models::ticket::{SupportTicket, TicketCategory};
use crate::services::telegram::Update;
use crate::services::{StkPushAck, StkPushRequest};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use serde::Deserialize;
use uuid::Uuid;

// --- Payments ---

/// STK-push body as received; every field is checked by the flow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushInput {
  pub phone: Option<String>,
  pub amount: Option<serde_json::Value>,
  pub order_id: Option<String>,
  pub account_reference: Option<String>,
  pub transaction_desc: Option<String>,
}

#[derive(Clone)]
pub struct StkPushCtx {
  pub app_state: AppState,
  pub input: StkPushInput,
  pub order_id: Option<Uuid>,
  pub request: Option<StkPushRequest>,
  pub ack: Option<StkPushAck>,
  /// `false` if the order had already left `pending` when the ack arrived.
  pub order_marked: bool,
}

impl StkPushCtx {
  pub fn new(app_state: AppState, input: StkPushInput) -> Self {
    Self {
      app_state,
      input,
      order_id: None,
      request: None,
      ack: None,
      order_marked: false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
  pub name: String,
  pub phone: String,
  pub email: Option<String>,
  pub job_account_id: Uuid,
}

#[derive(Clone)]
pub struct CheckoutCtx {
  pub app_state: AppState,
  pub user_id: Option<Uuid>,
  pub form: CheckoutForm,
  pub customer_name: String,
  pub customer_phone: String,
  pub customer_email: Option<String>,
  pub job: Option<JobAccount>,
  pub order: Option<Order>,
  pub ack: Option<StkPushAck>,
}

impl CheckoutCtx {
  pub fn new(app_state: AppState, user_id: Option<Uuid>, form: CheckoutForm) -> Self {
    Self {
      app_state,
      user_id,
      form,
      customer_name: String::new(),
      customer_phone: String::new(),
      customer_email: None,
      job: None,
      order: None,
      ack: None,
    }
  }
}

/// What the payment callback did with one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
  Completed { order_id: Uuid, purchase_created: bool },
  Failed { order_id: Uuid },
  /// Unknown checkout id or an order that was already settled.
  Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkCallback {
  pub checkout_request_id: String,
  pub result_code: i64,
  pub result_desc: String,
  pub receipt: Option<String>,
}

#[derive(Clone)]
pub struct CallbackCtx {
  pub app_state: AppState,
  pub payload: serde_json::Value,
  pub callback: Option<StkCallback>,
  pub outcome: Option<CallbackOutcome>,
}

impl CallbackCtx {
  pub fn new(app_state: AppState, payload: serde_json::Value) -> Self {
    Self {
      app_state,
      payload,
      callback: None,
      outcome: None,
    }
  }
}

// --- Admin ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
  Approve { receipt_number: String },
  Reject,
}

#[derive(Clone)]
pub struct ApprovalCtx {
  pub app_state: AppState,
  pub admin_id: Uuid,
  pub order_id: Uuid,
  pub decision: ApprovalDecision,
  pub fulfilment: Option<Fulfilment>,
  pub rejected: Option<Order>,
}

impl ApprovalCtx {
  pub fn new(app_state: AppState, admin_id: Uuid, order_id: Uuid, decision: ApprovalDecision) -> Self {
    Self {
      app_state,
      admin_id,
      order_id,
      decision,
      fulfilment: None,
      rejected: None,
    }
  }

  pub fn is_approval(&self) -> bool {
    matches!(self.decision, ApprovalDecision::Approve { .. })
  }
}

#[derive(Clone)]
pub struct AdminTicketReplyCtx {
  pub app_state: AppState,
  pub ticket_id: Uuid,
  pub reply: String,
  pub ticket: Option<SupportTicket>,
  pub relayed: bool,
}

impl AdminTicketReplyCtx {
  pub fn new(app_state: AppState, ticket_id: Uuid, reply: String) -> Self {
    Self {
      app_state,
      ticket_id,
      reply,
      ticket: None,
      relayed: false,
    }
  }
}

// --- Support ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicketForm {
  pub category: Option<String>,
  pub message: Option<String>,
  pub user_name: Option<String>,
  pub user_email: Option<String>,
}

#[derive(Clone)]
pub struct SupportTicketCtx {
  pub app_state: AppState,
  pub user: AuthenticatedUser,
  pub form: SupportTicketForm,
  pub category: Option<TicketCategory>,
  pub message: String,
  pub ticket: Option<SupportTicket>,
  pub operator_notified: bool,
}

impl SupportTicketCtx {
  pub fn new(app_state: AppState, user: AuthenticatedUser, form: SupportTicketForm) -> Self {
    Self {
      app_state,
      user,
      form,
      category: None,
      message: String::new(),
      ticket: None,
      operator_notified: false,
    }
  }
}

/// How the bot classified an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
  OperatorReply,
  Start,
  Help,
  CategoryChosen,
  SupportMessage,
  Ignored,
}

#[derive(Clone)]
pub struct TelegramUpdateCtx {
  pub app_state: AppState,
  pub update: Update,
  pub kind: UpdateKind,
  /// Ticket created or answered while handling this update.
  pub ticket: Option<SupportTicket>,
}

impl TelegramUpdateCtx {
  pub fn new(app_state: AppState, update: Update) -> Self {
    Self {
      app_state,
      update,
      kind: UpdateKind::Ignored,
      ticket: None,
    }
  }
}
