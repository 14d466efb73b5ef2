// storefront/src/services/mpesa.rs

use crate::config::MpesaConfig;
use crate::errors::{AppError, Result, Service};
use crate::validation::mask_phone;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Sanitised push parameters. The phone is already in `2547XXXXXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPushRequest {
  pub phone: String,
  pub amount: i32,
  pub account_reference: String,
  pub transaction_desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPushAck {
  pub checkout_request_id: String,
  pub merchant_request_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Prompts the customer's phone for their PIN. `PaymentRejected` when the
  /// provider declines, `Upstream` when it cannot be reached or authenticated.
  async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAck>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushPayload<'a> {
  business_short_code: &'a str,
  password: String,
  timestamp: String,
  transaction_type: &'static str,
  amount: i32,
  party_a: &'a str,
  party_b: &'a str,
  phone_number: &'a str,
  #[serde(rename = "CallBackURL")]
  call_back_url: &'a str,
  account_reference: &'a str,
  transaction_desc: &'a str,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
  #[serde(rename = "ResponseCode")]
  response_code: Option<String>,
  #[serde(rename = "CheckoutRequestID")]
  checkout_request_id: Option<String>,
  #[serde(rename = "MerchantRequestID")]
  merchant_request_id: Option<String>,
  #[serde(rename = "errorMessage")]
  error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  /// Daraja sends this as a string of seconds.
  #[serde(default)]
  expires_in: Option<String>,
}

struct CachedToken {
  value: String,
  expires_at: Instant,
}

/// Early refresh margin so a token never expires mid-request.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// East Africa Time is UTC+3 all year.
const EAT_OFFSET_HOURS: i64 = 3;

/// `YYYYMMDDHHmmss` in East Africa Time.
pub fn timestamp_at(now: DateTime<Utc>) -> String {
  (now + TimeDelta::hours(EAT_OFFSET_HOURS)).format("%Y%m%d%H%M%S").to_string()
}

pub fn password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
  BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

/// Safaricom Daraja STK-push client.
pub struct DarajaClient {
  http: reqwest::Client,
  base_url: String,
  config: MpesaConfig,
  token: Mutex<Option<CachedToken>>,
}

impl DarajaClient {
  pub fn new(config: MpesaConfig, timeout: Duration) -> Result<Self> {
    let base_url = config.env.base_url().to_string();
    Self::with_base_url(config, timeout, base_url)
  }

  pub fn with_base_url(config: MpesaConfig, timeout: Duration, base_url: impl Into<String>) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build M-Pesa HTTP client: {}", e)))?;
    Ok(Self {
      http,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      config,
      token: Mutex::new(None),
    })
  }

  async fn access_token(&self) -> Result<String> {
    if let Some(cached) = self.token.lock().as_ref() {
      if cached.expires_at > Instant::now() {
        return Ok(cached.value.clone());
      }
    }

    let credentials = BASE64.encode(format!("{}:{}", self.config.consumer_key, self.config.consumer_secret));
    let resp = self
      .http
      .get(format!("{}/oauth/v1/generate", self.base_url))
      .query(&[("grant_type", "client_credentials")])
      .header(reqwest::header::AUTHORIZATION, format!("Basic {}", credentials))
      .send()
      .await
      .map_err(|e| AppError::upstream(Service::Mpesa, e))?;

    if !resp.status().is_success() {
      let status = resp.status();
      let body = resp.text().await.unwrap_or_default();
      warn!(%status, body = %body, "Failed to get M-Pesa access token");
      return Err(AppError::upstream(Service::Mpesa, format!("token request failed with {}", status)));
    }

    let token: TokenResponse = resp.json().await.map_err(|e| AppError::upstream(Service::Mpesa, e))?;
    let lifetime = token
      .expires_in
      .as_deref()
      .and_then(|s| s.parse::<u64>().ok())
      .map(Duration::from_secs)
      .unwrap_or(Duration::ZERO);
    *self.token.lock() = Some(CachedToken {
      value: token.access_token.clone(),
      expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
    });
    Ok(token.access_token)
  }
}

#[async_trait]
impl PaymentGateway for DarajaClient {
  #[instrument(
    name = "mpesa::stk_push",
    skip(self, request),
    fields(phone = %mask_phone(&request.phone), amount = request.amount)
  )]
  async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAck> {
    let access_token = self.access_token().await?;
    info!("Access token obtained");

    let timestamp = timestamp_at(Utc::now());
    let shortcode = self.config.shortcode.as_str();
    let payload = StkPushPayload {
      business_short_code: shortcode,
      password: password(shortcode, &self.config.passkey, &timestamp),
      timestamp,
      transaction_type: "CustomerPayBillOnline",
      amount: request.amount,
      party_a: &request.phone,
      party_b: shortcode,
      phone_number: &request.phone,
      call_back_url: &self.config.callback_url,
      account_reference: &request.account_reference,
      transaction_desc: &request.transaction_desc,
    };

    let resp = self
      .http
      .post(format!("{}/mpesa/stkpush/v1/processrequest", self.base_url))
      .bearer_auth(access_token)
      .json(&payload)
      .send()
      .await
      .map_err(|e| AppError::upstream(Service::Mpesa, e))?;

    let status = resp.status();
    let result: StkPushResponse = resp.json().await.map_err(|e| AppError::upstream(Service::Mpesa, e))?;
    info!(%status, response_code = ?result.response_code, "STK Push response received");

    match (result.response_code.as_deref(), result.checkout_request_id) {
      (Some("0"), Some(checkout_request_id)) => Ok(StkPushAck {
        checkout_request_id,
        merchant_request_id: result.merchant_request_id.unwrap_or_default(),
      }),
      (code, _) => {
        warn!(response_code = ?code, error = ?result.error_message, "STK Push declined");
        Err(AppError::PaymentRejected(format!(
          "response code {}",
          code.unwrap_or("missing")
        )))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::MpesaEnv;
  use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
  use chrono::TimeZone;
  use serde_json::{json, Value};
  use std::sync::Arc;

  fn config(callback_url: &str) -> MpesaConfig {
    MpesaConfig {
      env: MpesaEnv::Sandbox,
      consumer_key: "key".into(),
      consumer_secret: "secret".into(),
      passkey: "pass".into(),
      shortcode: "174379".into(),
      callback_url: callback_url.into(),
    }
  }

  #[test]
  fn timestamp_is_east_africa_time() {
    let now = Utc.with_ymd_and_hms(2024, 12, 31, 22, 5, 9).unwrap();
    assert_eq!(timestamp_at(now), "20250101010509");
  }

  #[test]
  fn password_is_base64_of_concatenation() {
    assert_eq!(password("174379", "pass", "20240101000000"), BASE64.encode("174379pass20240101000000"));
  }

  struct FakeDaraja {
    token_calls: parking_lot::Mutex<u32>,
    last_push: parking_lot::Mutex<Option<(Option<String>, Value)>>,
    response: Value,
  }

  async fn token(state: web::Data<Arc<FakeDaraja>>, req: HttpRequest) -> HttpResponse {
    *state.token_calls.lock() += 1;
    let auth = req.headers().get("authorization").and_then(|v| v.to_str().ok());
    let expected = format!("Basic {}", BASE64.encode("key:secret"));
    if auth != Some(expected.as_str()) {
      return HttpResponse::Unauthorized().finish();
    }
    HttpResponse::Ok().json(json!({"access_token": "tok", "expires_in": "3599"}))
  }

  async fn push(state: web::Data<Arc<FakeDaraja>>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    let auth = req
      .headers()
      .get("authorization")
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    *state.last_push.lock() = Some((auth, body.into_inner()));
    HttpResponse::Ok().json(state.response.clone())
  }

  async fn start_fake(response: Value) -> (String, Arc<FakeDaraja>, actix_web::dev::ServerHandle) {
    let fake = Arc::new(FakeDaraja {
      token_calls: parking_lot::Mutex::new(0),
      last_push: parking_lot::Mutex::new(None),
      response,
    });
    let data = web::Data::new(fake.clone());
    let server = HttpServer::new(move || {
      App::new()
        .app_data(data.clone())
        .route("/oauth/v1/generate", web::get().to(token))
        .route("/mpesa/stkpush/v1/processrequest", web::post().to(push))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_rt::spawn(server);
    (format!("http://{}", addr), fake, handle)
  }

  fn request() -> StkPushRequest {
    StkPushRequest {
      phone: "254712345678".into(),
      amount: 1500,
      account_reference: "RWM-ab12cd34".into(),
      transaction_desc: "Payment for D".into(),
    }
  }

  #[actix_rt::test]
  async fn successful_push_returns_ids_and_reuses_token() {
    let (base, fake, handle) = start_fake(json!({
      "ResponseCode": "0",
      "CheckoutRequestID": "ws_CO_1",
      "MerchantRequestID": "m-1",
      "CustomerMessage": "Success"
    }))
    .await;
    let client =
      DarajaClient::with_base_url(config("https://shop.test/cb"), Duration::from_secs(5), base).unwrap();

    let ack = client.stk_push(&request()).await.unwrap();
    assert_eq!(ack.checkout_request_id, "ws_CO_1");
    assert_eq!(ack.merchant_request_id, "m-1");

    let (auth, body) = fake.last_push.lock().clone().unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer tok"));
    assert_eq!(body["BusinessShortCode"], "174379");
    assert_eq!(body["PartyB"], "174379");
    assert_eq!(body["PartyA"], "254712345678");
    assert_eq!(body["PhoneNumber"], "254712345678");
    assert_eq!(body["TransactionType"], "CustomerPayBillOnline");
    assert_eq!(body["Amount"], 1500);
    assert_eq!(body["CallBackURL"], "https://shop.test/cb");
    assert_eq!(body["AccountReference"], "RWM-ab12cd34");
    let ts = body["Timestamp"].as_str().unwrap();
    assert_eq!(ts.len(), 14);
    assert_eq!(body["Password"], password("174379", "pass", ts));

    client.stk_push(&request()).await.unwrap();
    assert_eq!(*fake.token_calls.lock(), 1);
    handle.stop(false).await;
  }

  #[actix_rt::test]
  async fn non_zero_response_code_is_a_rejection() {
    let (base, _fake, handle) = start_fake(json!({"ResponseCode": "1", "ResponseDescription": "Rejected"})).await;
    let client = DarajaClient::with_base_url(config("https://shop.test/cb"), Duration::from_secs(5), base).unwrap();
    let err = client.stk_push(&request()).await.unwrap_err();
    assert!(matches!(err, AppError::PaymentRejected(_)), "got {err:?}");
    handle.stop(false).await;
  }

  #[actix_rt::test]
  async fn unreachable_provider_is_upstream_error() {
    let client = DarajaClient::with_base_url(
      config("https://shop.test/cb"),
      Duration::from_secs(2),
      "http://127.0.0.1:9",
    )
    .unwrap();
    let err = client.stk_push(&request()).await.unwrap_err();
    assert!(
      matches!(err, AppError::Upstream { service: Service::Mpesa, .. }),
      "got {err:?}"
    );
  }
}
