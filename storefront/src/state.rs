// storefront/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::pipelines::telegram_pipeline::BotSessions;
use crate::rate_limit::RateLimiter;
use crate::services::{Messenger, PaymentGateway};
use crate::store::Store;
use hatua::FlowRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
  pub gateway: Arc<dyn PaymentGateway>,
  /// `None` when no bot token / operator chat is configured.
  pub messenger: Option<Arc<dyn Messenger>>,
  pub rate_limiter: Arc<RateLimiter>,
  pub bot_sessions: Arc<BotSessions>,
}

impl AppState {
  /// The messenger plus the operator chat id, or a config error when the bot is off.
  pub fn telegram(&self) -> Result<(Arc<dyn Messenger>, i64)> {
    match (&self.messenger, &self.config.telegram) {
      (Some(messenger), Some(telegram)) => Ok((messenger.clone(), telegram.admin_chat_id)),
      _ => Err(AppError::Config("Telegram not configured".to_string())),
    }
  }
}
