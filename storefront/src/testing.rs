// storefront/src/testing.rs

//! Test doubles and an `AppState` wired to them.

use crate::config::{AppConfig, LogFormat, MpesaConfig, MpesaEnv, RateLimitConfig, TelegramConfig};
use crate::errors::{AppError, Result, Service};
use crate::models::job_account::JobAccount;
use crate::models::order::{NewOrder, Order};
use crate::pipelines::register_all_flows;
use crate::pipelines::telegram_pipeline::BotSessions;
use crate::rate_limit::RateLimiter;
use crate::services::telegram::WebhookStatus;
use crate::services::{InlineButton, Messenger, PaymentGateway, StkPushAck, StkPushRequest};
use crate::state::AppState;
use crate::store::memory::MemoryStore;
use crate::store::Store;
use crate::web::extractors::{TokenClaims, TOKEN_AUDIENCE};
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-jwt-secret";
const ADMIN_CHAT_ID: i64 = -1_001_234;

#[derive(Default)]
pub struct FakeGateway {
  requests: Mutex<Vec<StkPushRequest>>,
  counter: AtomicI64,
  reject_next: AtomicBool,
  fail_next: AtomicBool,
}

impl FakeGateway {
  pub fn requests(&self) -> Vec<StkPushRequest> {
    self.requests.lock().clone()
  }

  /// Next push gets a non-zero ResponseCode.
  pub fn reject_next(&self) {
    self.reject_next.store(true, Ordering::SeqCst);
  }

  /// Next push fails as if the provider were unreachable.
  pub fn fail_next(&self) {
    self.fail_next.store(true, Ordering::SeqCst);
  }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
  async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAck> {
    self.requests.lock().push(request.clone());
    if self.fail_next.swap(false, Ordering::SeqCst) {
      return Err(AppError::upstream(Service::Mpesa, "connection refused"));
    }
    if self.reject_next.swap(false, Ordering::SeqCst) {
      return Err(AppError::PaymentRejected("ResponseCode 1".to_string()));
    }
    let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(StkPushAck {
      checkout_request_id: format!("ws_CO_{}", n),
      merchant_request_id: format!("mr_{}", n),
    })
  }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
  pub chat_id: i64,
  pub text: String,
  pub keyboard: Vec<InlineButton>,
  pub message_id: i64,
}

#[derive(Default)]
pub struct RecordingMessenger {
  sent: Mutex<Vec<SentMessage>>,
  answered: Mutex<Vec<(String, String)>>,
  webhooks: Mutex<Vec<String>>,
  next_id: AtomicI64,
  fail: AtomicBool,
}

impl RecordingMessenger {
  pub fn sent(&self) -> Vec<SentMessage> {
    self.sent.lock().clone()
  }

  pub fn answered(&self) -> Vec<(String, String)> {
    self.answered.lock().clone()
  }

  pub fn webhooks(&self) -> Vec<String> {
    self.webhooks.lock().clone()
  }

  pub fn fail_sends(&self) {
    self.fail.store(true, Ordering::SeqCst);
  }
}

#[async_trait]
impl Messenger for RecordingMessenger {
  async fn send_message(&self, chat_id: i64, html: &str, keyboard: Option<&[InlineButton]>) -> Result<i64> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(AppError::upstream(Service::Telegram, "Bad Request: chat not found"));
    }
    let message_id = 1000 + self.next_id.fetch_add(1, Ordering::SeqCst);
    self.sent.lock().push(SentMessage {
      chat_id,
      text: html.to_string(),
      keyboard: keyboard.map(<[InlineButton]>::to_vec).unwrap_or_default(),
      message_id,
    });
    Ok(message_id)
  }

  async fn answer_callback_query(&self, callback_query_id: &str, text: &str) -> Result<()> {
    self.answered.lock().push((callback_query_id.to_string(), text.to_string()));
    Ok(())
  }

  async fn set_webhook(&self, url: &str) -> Result<WebhookStatus> {
    self.webhooks.lock().push(url.to_string());
    Ok(WebhookStatus {
      ok: true,
      description: Some("Webhook was set".to_string()),
    })
  }
}

pub fn test_config(with_telegram: bool) -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".into(),
    server_port: 8080,
    database_url: "postgres://unused".into(),
    database_max_connections: 1,
    run_migrations: false,
    public_base_url: "https://shop.test".into(),
    jwt_secret: JWT_SECRET.into(),
    http_client_timeout: Duration::from_secs(5),
    mpesa: MpesaConfig {
      env: MpesaEnv::Sandbox,
      consumer_key: "key".into(),
      consumer_secret: "secret".into(),
      passkey: "passkey".into(),
      shortcode: "174379".into(),
      callback_url: "https://shop.test/api/v1/payments/mpesa/callback".into(),
    },
    telegram: with_telegram.then(|| TelegramConfig {
      bot_token: "TOKEN".into(),
      admin_chat_id: ADMIN_CHAT_ID,
      webhook_url: "https://shop.test/api/v1/telegram/webhook".into(),
    }),
    rate_limit: RateLimitConfig::default(),
    log_format: LogFormat::Pretty,
  }
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<FakeGateway>,
  pub messenger: Arc<RecordingMessenger>,
}

impl TestApp {
  pub fn new() -> Self {
    Self::build(true)
  }

  pub fn without_telegram() -> Self {
    Self::build(false)
  }

  fn build(with_telegram: bool) -> Self {
    let config = test_config(with_telegram);
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(FakeGateway::default());
    let messenger = Arc::new(RecordingMessenger::default());
    let state = AppState {
      store: store.clone(),
      flows: Arc::new(hatua::FlowRegistry::new()),
      gateway: gateway.clone(),
      messenger: with_telegram.then(|| messenger.clone() as Arc<dyn Messenger>),
      rate_limiter: Arc::new(RateLimiter::new(config.rate_limit)),
      bot_sessions: Arc::new(BotSessions::new()),
      config: Arc::new(config),
    };
    register_all_flows(&state.flows);
    Self {
      state,
      store,
      gateway,
      messenger,
    }
  }

  pub fn admin_chat_id(&self) -> i64 {
    ADMIN_CHAT_ID
  }

  pub async fn pending_order(&self, phone: &str, amount: i32) -> Order {
    let job = self.store.add_job("Data Annotator", amount, 10);
    self
      .store
      .insert_order(NewOrder {
        customer_name: "Test Buyer".into(),
        customer_phone: phone.into(),
        customer_email: None,
        user_id: None,
        job_account_id: job.id,
        amount,
      })
      .await
      .unwrap()
  }

  /// A signed-in buyer's order already handed to the provider under `checkout_id`.
  pub async fn processing_order_for_user(&self, checkout_id: &str) -> (Order, JobAccount) {
    let job = self.store.add_job("Survey Taker", 1200, 10);
    let order = self
      .store
      .insert_order(NewOrder {
        customer_name: "Test Buyer".into(),
        customer_phone: "254712345678".into(),
        customer_email: None,
        user_id: Some(Uuid::new_v4()),
        job_account_id: job.id,
        amount: job.price,
      })
      .await
      .unwrap();
    assert!(self.store.mark_processing(order.id, checkout_id).await.unwrap());
    (self.order(order.id).await, job)
  }

  pub async fn order(&self, id: Uuid) -> Order {
    self.store.get_order(id).await.unwrap().expect("order exists")
  }

  pub async fn job(&self, id: Uuid) -> JobAccount {
    self.store.get_job_account(id).await.unwrap().expect("job exists")
  }

  /// Admin user with a profile and a minted bearer token.
  pub fn admin(&self) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    self.store.add_profile(user_id, "Site Admin");
    self.store.grant_role(user_id, crate::models::profile::AppRole::Admin);
    (user_id, token_for(user_id))
  }
}

pub fn token_for(user_id: Uuid) -> String {
  let claims = TokenClaims {
    sub: user_id.to_string(),
    role: "authenticated".into(),
    aud: TOKEN_AUDIENCE.into(),
    exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    email: Some("buyer@example.com".into()),
  };
  encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

pub fn stk_callback_body(checkout_id: &str, result_code: i64, receipt: Option<&str>) -> Value {
  let mut callback = json!({
    "MerchantRequestID": "mr_1",
    "CheckoutRequestID": checkout_id,
    "ResultCode": result_code,
    "ResultDesc": if result_code == 0 { "The service request is processed successfully." } else { "Request cancelled by user" },
  });
  if let Some(receipt) = receipt {
    callback["CallbackMetadata"] = json!({"Item": [
      {"Name": "Amount", "Value": 1200},
      {"Name": "MpesaReceiptNumber", "Value": receipt},
      {"Name": "PhoneNumber", "Value": 254712345678u64}
    ]});
  }
  json!({"Body": {"stkCallback": callback}})
}
