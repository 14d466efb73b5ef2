// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnv {
  Sandbox,
  Production,
}

impl MpesaEnv {
  pub fn base_url(self) -> &'static str {
    match self {
      MpesaEnv::Sandbox => "https://sandbox.safaricom.co.ke",
      MpesaEnv::Production => "https://api.safaricom.co.ke",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl LogFormat {
  /// Read on its own so tracing can be set up before the rest of the config loads.
  pub fn from_env() -> Self {
    match env::var("LOG_FORMAT").unwrap_or_default().to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      _ => LogFormat::Pretty,
    }
  }
}

#[derive(Clone)]
pub struct MpesaConfig {
  pub env: MpesaEnv,
  pub consumer_key: String,
  pub consumer_secret: String,
  pub passkey: String,
  pub shortcode: String,
  pub callback_url: String,
}

// Secrets stay out of Debug output.
impl std::fmt::Debug for MpesaConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MpesaConfig")
      .field("env", &self.env)
      .field("shortcode", &self.shortcode)
      .field("callback_url", &self.callback_url)
      .finish_non_exhaustive()
  }
}

#[derive(Clone)]
pub struct TelegramConfig {
  pub bot_token: String,
  pub admin_chat_id: i64,
  pub webhook_url: String,
}

impl std::fmt::Debug for TelegramConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TelegramConfig")
      .field("admin_chat_id", &self.admin_chat_id)
      .field("webhook_url", &self.webhook_url)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
  pub per_phone: u32,
  pub global: u32,
  pub window: Duration,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      per_phone: 3,
      global: 100,
      window: Duration::from_secs(60),
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub database_max_connections: u32,
  pub run_migrations: bool,
  pub public_base_url: String,
  pub jwt_secret: String,
  pub http_client_timeout: Duration,
  pub mpesa: MpesaConfig,
  /// `None` when the bot token or the admin chat id is missing.
  pub telegram: Option<TelegramConfig>,
  pub rate_limit: RateLimitConfig,
  pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_max_connections", &self.database_max_connections)
      .field("run_migrations", &self.run_migrations)
      .field("public_base_url", &self.public_base_url)
      .field("mpesa", &self.mpesa)
      .field("telegram", &self.telegram)
      .field("rate_limit", &self.rate_limit)
      .field("log_format", &self.log_format)
      .finish_non_exhaustive()
  }
}

fn get_env(var_name: &str) -> Result<String> {
  env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
}

fn get_parsed<T>(var_name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(var_name) {
    Ok(raw) if !raw.trim().is_empty() => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
    _ => Ok(default),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_parsed::<u16>("SERVER_PORT", 8080)?;
    let database_url = get_env("DATABASE_URL")?;
    let database_max_connections = get_parsed::<u32>("DATABASE_MAX_CONNECTIONS", 10)?;
    let run_migrations = get_parsed::<bool>("RUN_MIGRATIONS", false)?;
    let public_base_url = get_env("PUBLIC_BASE_URL")
      .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();
    let jwt_secret = get_env("SUPABASE_JWT_SECRET")?;
    let http_client_timeout = Duration::from_secs(get_parsed::<u64>("HTTP_CLIENT_TIMEOUT_SECS", 30)?);

    let mpesa_env = match get_env("MPESA_ENV").unwrap_or_default().to_ascii_lowercase().as_str() {
      "" | "sandbox" => MpesaEnv::Sandbox,
      "production" => MpesaEnv::Production,
      other => return Err(AppError::Config(format!("Invalid MPESA_ENV: {}", other))),
    };
    let mpesa = MpesaConfig {
      env: mpesa_env,
      consumer_key: get_env("MPESA_CONSUMER_KEY")?,
      consumer_secret: get_env("MPESA_CONSUMER_SECRET")?,
      passkey: get_env("MPESA_PASSKEY")?,
      shortcode: get_env("MPESA_SHORTCODE").unwrap_or_else(|_| "174379".to_string()),
      callback_url: get_env("MPESA_CALLBACK_URL")
        .unwrap_or_else(|_| format!("{}/api/v1/payments/mpesa/callback", public_base_url)),
    };

    let telegram = match (get_env("TELEGRAM_BOT_TOKEN"), get_env("TELEGRAM_ADMIN_CHAT_ID")) {
      (Ok(bot_token), Ok(admin_chat_id)) => Some(TelegramConfig {
        bot_token,
        admin_chat_id: admin_chat_id
          .trim()
          .parse::<i64>()
          .map_err(|e| AppError::Config(format!("Invalid TELEGRAM_ADMIN_CHAT_ID: {}", e)))?,
        webhook_url: get_env("TELEGRAM_WEBHOOK_URL")
          .unwrap_or_else(|_| format!("{}/api/v1/telegram/webhook", public_base_url)),
      }),
      _ => {
        tracing::warn!("Telegram bot token or admin chat id missing; support bridge disabled.");
        None
      }
    };

    let defaults = RateLimitConfig::default();
    let rate_limit = RateLimitConfig {
      per_phone: get_parsed("RATE_LIMIT_PER_PHONE", defaults.per_phone)?,
      global: get_parsed("RATE_LIMIT_GLOBAL", defaults.global)?,
      window: Duration::from_secs(get_parsed("RATE_LIMIT_WINDOW_SECS", defaults.window.as_secs())?),
    };
    if rate_limit.window.is_zero() {
      return Err(AppError::Config("RATE_LIMIT_WINDOW_SECS must be positive".to_string()));
    }

    let log_format = LogFormat::from_env();

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      run_migrations,
      public_base_url,
      jwt_secret,
      http_client_timeout,
      mpesa,
      telegram,
      rate_limit,
      log_format,
    })
  }
}
