// storefront/src/services/mod.rs

//! Outbound integrations. Flows talk to the traits; `AppState` holds the
//! real clients in production and recording fakes in tests.

pub mod mpesa;
pub mod telegram;

pub use mpesa::{DarajaClient, PaymentGateway, StkPushAck, StkPushRequest};
pub use telegram::{InlineButton, Messenger, TelegramClient};
