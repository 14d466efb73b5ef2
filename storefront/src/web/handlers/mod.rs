// storefront/src/web/handlers/mod.rs
pub mod admin_handlers;
pub mod catalog_handlers;
pub mod checkout_handlers;
pub mod health_handlers;
pub mod order_handlers;
pub mod payment_handlers;
pub mod support_handlers;
pub mod task_handlers;
pub mod telegram_handlers;
