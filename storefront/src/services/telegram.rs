// storefront/src/services/telegram.rs

use crate::errors::{AppError, Result, Service};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// One button of an inline keyboard; rendered one per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
  pub text: String,
  pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookStatus {
  pub ok: bool,
  pub description: Option<String>,
}

#[async_trait]
pub trait Messenger: Send + Sync {
  /// Sends HTML-formatted text and returns the new message's id.
  async fn send_message(&self, chat_id: i64, html: &str, keyboard: Option<&[InlineButton]>) -> Result<i64>;

  async fn answer_callback_query(&self, callback_query_id: &str, text: &str) -> Result<()>;

  async fn set_webhook(&self, url: &str) -> Result<WebhookStatus>;
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      other => out.push(other),
    }
  }
  out
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
  ok: bool,
  result: Option<T>,
  description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
  message_id: i64,
}

/// Incoming Bot API update (only the parts the support bot reads).
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
  pub update_id: i64,
  pub message: Option<Message>,
  pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
  pub message_id: i64,
  pub chat: Chat,
  pub from: Option<User>,
  pub text: Option<String>,
  pub reply_to_message: Option<Box<Message>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
  pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
  pub id: i64,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub username: Option<String>,
}

impl User {
  pub fn first_name_or_default(&self) -> &str {
    self.first_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("User")
  }

  pub fn full_name(&self) -> String {
    [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .filter(|n| !n.is_empty())
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
  pub id: String,
  pub from: User,
  pub message: Option<Message>,
  pub data: Option<String>,
}

/// Telegram Bot API client.
pub struct TelegramClient {
  http: reqwest::Client,
  api_base: String,
}

impl TelegramClient {
  pub fn new(bot_token: &str, timeout: Duration) -> Result<Self> {
    Self::with_api_url(bot_token, timeout, TELEGRAM_API)
  }

  pub fn with_api_url(bot_token: &str, timeout: Duration, api_url: &str) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build Telegram HTTP client: {}", e)))?;
    Ok(Self {
      http,
      api_base: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
    })
  }

  async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, body: serde_json::Value) -> Result<ApiResponse<T>> {
    let resp = self
      .http
      .post(format!("{}/{}", self.api_base, method))
      .json(&body)
      .send()
      .await
      .map_err(|e| AppError::upstream(Service::Telegram, e))?;
    resp
      .json::<ApiResponse<T>>()
      .await
      .map_err(|e| AppError::upstream(Service::Telegram, e))
  }
}

#[async_trait]
impl Messenger for TelegramClient {
  #[instrument(name = "telegram::send_message", skip(self, html, keyboard))]
  async fn send_message(&self, chat_id: i64, html: &str, keyboard: Option<&[InlineButton]>) -> Result<i64> {
    let mut body = json!({
      "chat_id": chat_id,
      "text": html,
      "parse_mode": "HTML",
    });
    if let Some(buttons) = keyboard {
      let rows: Vec<[&InlineButton; 1]> = buttons.iter().map(|b| [b]).collect();
      body["reply_markup"] = json!({ "inline_keyboard": rows });
    }

    let resp: ApiResponse<SentMessage> = self.call("sendMessage", body).await?;
    match (resp.ok, resp.result) {
      (true, Some(sent)) => {
        debug!(message_id = sent.message_id, "Telegram message sent");
        Ok(sent.message_id)
      }
      _ => {
        warn!(description = ?resp.description, "Telegram rejected sendMessage");
        Err(AppError::upstream(
          Service::Telegram,
          resp.description.unwrap_or_else(|| "sendMessage failed".to_string()),
        ))
      }
    }
  }

  #[instrument(name = "telegram::answer_callback_query", skip(self))]
  async fn answer_callback_query(&self, callback_query_id: &str, text: &str) -> Result<()> {
    let resp: ApiResponse<bool> = self
      .call(
        "answerCallbackQuery",
        json!({ "callback_query_id": callback_query_id, "text": text }),
      )
      .await?;
    if !resp.ok {
      warn!(description = ?resp.description, "Telegram rejected answerCallbackQuery");
    }
    Ok(())
  }

  #[instrument(name = "telegram::set_webhook", skip(self))]
  async fn set_webhook(&self, url: &str) -> Result<WebhookStatus> {
    let resp: ApiResponse<bool> = self.call("setWebhook", json!({ "url": url })).await?;
    Ok(WebhookStatus {
      ok: resp.ok,
      description: resp.description,
    })
  }
}
