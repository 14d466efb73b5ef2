// storefront/src/main.rs

mod config;
mod errors;
mod models;
mod pipelines;
mod rate_limit;
mod services;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod validation;
mod web;

use crate::config::{AppConfig, LogFormat};
use crate::errors::AppError;
use crate::pipelines::telegram_pipeline::BotSessions;
use crate::rate_limit::{RateLimiter, SWEEP_INTERVAL};
use crate::services::{DarajaClient, Messenger, TelegramClient};
use crate::state::AppState;
use crate::store::PgStore;

use actix_web::{web as actix_data, App, HttpServer};
use hatua::FlowRegistry;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

fn fatal(context: &str, err: impl std::fmt::Display) -> std::io::Error {
  tracing::error!(error = %err, "{}", context);
  std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  dotenvy::dotenv().ok();
  init_tracing(LogFormat::from_env());

  tracing::info!("Starting storefront server...");

  let app_config = Arc::new(AppConfig::from_env().map_err(|e| fatal("Failed to load application configuration", e))?);
  tracing::debug!(config = ?app_config, "Configuration in effect.");

  let db_pool = PgPoolOptions::new()
    .max_connections(app_config.database_max_connections)
    .connect(&app_config.database_url)
    .await
    .map_err(|e| fatal("Failed to connect to the database", e))?;
  tracing::info!("Successfully connected to the database.");

  if app_config.run_migrations {
    sqlx::migrate!("./migrations")
      .run(&db_pool)
      .await
      .map_err(|e| fatal("Database migration failed", e))?;
    tracing::info!("Database migrations applied.");
  }

  let gateway = DarajaClient::new(app_config.mpesa.clone(), app_config.http_client_timeout)
    .map_err(|e| fatal("Failed to build the M-Pesa client", e))?;

  let messenger = match &app_config.telegram {
    Some(telegram) => {
      let client = TelegramClient::new(&telegram.bot_token, app_config.http_client_timeout)
        .map_err(|e| fatal("Failed to build the Telegram client", e))?;
      Some(Arc::new(client) as Arc<dyn Messenger>)
    }
    None => None,
  };

  let flows = Arc::new(FlowRegistry::<AppError>::new());
  pipelines::register_all_flows(&flows);

  let rate_limiter = Arc::new(RateLimiter::new(app_config.rate_limit));
  let sweeper = rate_limiter.clone();
  actix_web::rt::spawn(async move {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
      ticker.tick().await;
      let removed = sweeper.sweep();
      if removed > 0 {
        tracing::debug!(removed, "Expired rate-limit entries swept.");
      }
    }
  });

  let app_state = AppState {
    store: Arc::new(PgStore::new(db_pool)),
    flows,
    config: app_config.clone(),
    gateway: Arc::new(gateway),
    messenger,
    rate_limiter,
    bot_sessions: Arc::new(BotSessions::new()),
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
