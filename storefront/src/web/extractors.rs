// storefront/src/web/extractors.rs

//! Bearer-token extractors. Tokens are HS256 JWTs issued by the identity
//! provider with audience `authenticated`; `sub` is the user id. The admin
//! role is looked up in `user_roles`, never trusted from the token.

use crate::errors::AppError;
use crate::models::profile::AppRole;
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

pub const TOKEN_AUDIENCE: &str = "authenticated";

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
  pub sub: String,
  #[serde(default)]
  pub role: String,
  pub aud: String,
  pub exp: usize,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub email: Option<String>,
}

/// Present when a valid bearer token was sent; an absent header is not an error.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

fn decode_token(token: &str, secret: &str) -> Result<AuthenticatedUser, AppError> {
  let mut validation = Validation::new(Algorithm::HS256);
  validation.set_audience(&[TOKEN_AUDIENCE]);
  let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).map_err(|e| {
    debug!(error = %e, "Bearer token rejected.");
    AppError::Auth("Invalid or expired token".to_string())
  })?;
  let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Auth("Invalid token subject".to_string()))?;
  Ok(AuthenticatedUser {
    user_id,
    email: data.claims.email,
  })
}

fn bearer(req: &HttpRequest) -> Option<&str> {
  req
    .headers()
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
}

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
  req
    .app_data::<web::Data<AppState>>()
    .cloned()
    .ok_or_else(|| AppError::Internal("Application state missing".to_string()))
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
  let state = app_state(req)?;
  let token = bearer(req).ok_or_else(|| AppError::Auth("Authentication required".to_string()))?;
  decode_token(token, &state.config.jwt_secret)
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(authenticate(req))
  }
}

impl FromRequest for OptionalUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    if bearer(req).is_none() {
      return ready(Ok(OptionalUser(None)));
    }
    // A token that is present but invalid is still rejected.
    ready(authenticate(req).map(|user| OptionalUser(Some(user))))
  }
}

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let authenticated = authenticate(req);
    let state = app_state(req);
    Box::pin(async move {
      let user = authenticated?;
      let roles = state?.store.roles_for(user.user_id).await?;
      if !roles.contains(&AppRole::Admin) {
        warn!(user_id = %user.user_id, "Non-admin attempted an admin route.");
        return Err(AppError::Forbidden("Admin access required".to_string()));
      }
      Ok(AdminUser(user))
    })
  }
}
