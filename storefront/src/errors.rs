// storefront/src/errors.rs

use actix_web::error::JsonPayloadError;
use actix_web::http::{header, StatusCode};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use hatua::FlowError;
use serde_json::json;
use thiserror::Error;

/// Which third-party service an `Upstream` error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
  Mpesa,
  Telegram,
}

impl std::fmt::Display for Service {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Service::Mpesa => f.write_str("M-Pesa"),
      Service::Telegram => f.write_str("Telegram"),
    }
  }
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Rate limited, retry after {retry_after}s")]
  RateLimited { retry_after: u64 },

  /// The provider answered but declined the request (non-zero response code).
  #[error("Payment rejected by provider: {0}")]
  PaymentRejected(String),

  /// Transport, auth or decoding failure talking to a provider.
  #[error("{service} upstream error: {detail}")]
  Upstream { service: Service, detail: String },

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Flow Error: {source}")]
  Flow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn upstream(service: Service, detail: impl std::fmt::Display) -> Self {
    AppError::Upstream {
      service,
      detail: detail.to_string(),
    }
  }

  /// Message shown to the caller. Internal details stay in the logs.
  fn public_message(&self) -> String {
    match self {
      AppError::Validation(m)
      | AppError::Auth(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m)
      | AppError::Config(m) => m.clone(),
      AppError::RateLimited { .. } => "Too many payment requests. Please try again later.".to_string(),
      AppError::PaymentRejected(_) => "Payment request failed. Please try again.".to_string(),
      AppError::Upstream {
        service: Service::Mpesa, ..
      } => "Payment service temporarily unavailable".to_string(),
      AppError::Upstream {
        service: Service::Telegram,
        ..
      } => "Messaging service temporarily unavailable".to_string(),
      AppError::Sqlx(_) => "Database operation failed".to_string(),
      AppError::Flow { .. } | AppError::Internal(_) => "An internal error occurred".to_string(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::PaymentRejected(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
      AppError::Upstream { .. }
      | AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Flow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }

    let mut builder = HttpResponse::build(status);
    match self {
      AppError::RateLimited { retry_after } => builder
        .insert_header((header::RETRY_AFTER, retry_after.to_string()))
        .json(json!({
          "success": false,
          "error": self.public_message(),
          "retryAfter": retry_after,
        })),
      _ => builder.json(json!({"success": false, "error": self.public_message()})),
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Installed as the `JsonConfig` error handler so body decoding failures use
/// the same `{success, error}` envelope as every other error.
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
  tracing::warn!(path = %req.path(), error = %err, "Request body rejected.");
  let message = match &err {
    JsonPayloadError::ContentType => "Content-Type must be application/json",
    JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => "Request body too large",
    _ => "Invalid request body",
  };
  AppError::Validation(message.to_string()).into()
}
