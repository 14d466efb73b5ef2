// storefront/src/models/ticket.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
  Open,
  Replied,
  Closed,
}

impl FromStr for TicketStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "open" => Ok(TicketStatus::Open),
      "replied" => Ok(TicketStatus::Replied),
      "closed" => Ok(TicketStatus::Closed),
      other => Err(format!("Unknown ticket status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "ticket_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketCategory {
  Payments,
  Technical,
  Account,
  Other,
}

impl TicketCategory {
  pub const ALL: [TicketCategory; 4] = [
    TicketCategory::Payments,
    TicketCategory::Technical,
    TicketCategory::Account,
    TicketCategory::Other,
  ];

  pub fn id(self) -> &'static str {
    match self {
      TicketCategory::Payments => "payments",
      TicketCategory::Technical => "technical",
      TicketCategory::Account => "account",
      TicketCategory::Other => "other",
    }
  }

  /// Label used in operator notices for web tickets.
  pub fn label(self) -> &'static str {
    match self {
      TicketCategory::Payments => "💳 Payments",
      TicketCategory::Technical => "🔧 Technical",
      TicketCategory::Account => "👤 Account",
      TicketCategory::Other => "📝 Other",
    }
  }

  /// Button label in the bot's category menu.
  pub fn menu_label(self) -> &'static str {
    match self {
      TicketCategory::Payments => "💳 Payments",
      TicketCategory::Technical => "🔧 Technical Support",
      TicketCategory::Account => "👤 Account Issues",
      TicketCategory::Other => "📝 Other",
    }
  }
}

impl FromStr for TicketCategory {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    TicketCategory::ALL
      .into_iter()
      .find(|c| c.id() == s)
      .ok_or_else(|| format!("Unknown category '{}'", s))
  }
}

/// Where a ticket was opened. Fixed at creation so it survives the user being unlinked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "ticket_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketSource {
  Telegram,
  Web,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportTicket {
  pub id: Uuid,
  pub user_id: Option<Uuid>,
  pub source: TicketSource,
  pub telegram_chat_id: i64,
  pub telegram_user_id: i64,
  pub telegram_username: Option<String>,
  pub telegram_first_name: Option<String>,
  pub category: TicketCategory,
  pub message: String,
  pub status: TicketStatus,
  /// Message id of the operator notice; replies to it thread back here.
  pub admin_message_id: Option<i64>,
  pub admin_reply: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl SupportTicket {
  /// Web tickets carry a synthetic chat id that no Telegram chat answers to.
  pub fn is_from_web(&self) -> bool {
    self.source == TicketSource::Web
  }
}

#[derive(Debug, Clone)]
pub struct NewTicket {
  pub user_id: Option<Uuid>,
  pub source: TicketSource,
  pub telegram_chat_id: i64,
  pub telegram_user_id: i64,
  pub telegram_username: Option<String>,
  pub telegram_first_name: Option<String>,
  pub category: TicketCategory,
  pub message: String,
}

/// Telegram-shaped ids for a web user: chat id is negative so it never collides
/// with a private chat, both derived from the account UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebIdentity {
  pub chat_id: i64,
  pub user_id: i64,
}

const I32_MAX: u64 = 2_147_483_647;

impl WebIdentity {
  pub fn for_user(user_id: Uuid) -> Self {
    let hex = user_id.simple().to_string();
    // A simple-format UUID is 32 lowercase hex digits, so these slices always parse.
    let chat_seed = u64::from_str_radix(&hex[..10], 16).unwrap_or(0);
    let user_seed = u64::from_str_radix(&hex[..8], 16).unwrap_or(0);
    Self {
      chat_id: -((chat_seed % I32_MAX) as i64),
      user_id: (user_seed % I32_MAX) as i64,
    }
  }
}
