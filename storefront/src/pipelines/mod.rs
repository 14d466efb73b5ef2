// storefront/src/pipelines/mod.rs

//! Every state-changing operation runs as a registered `hatua` flow.

use crate::errors::AppError;
use hatua::FlowRegistry;

pub mod contexts;

pub mod admin_reply_pipeline;
pub mod approval_pipeline;
pub mod callback_pipeline;
pub mod checkout_pipeline;
pub mod stk_push_pipeline;
pub mod support_ticket_pipeline;
pub mod telegram_pipeline;

/// Registers all flows. Called once at startup, before the server binds.
pub fn register_all_flows(registry: &FlowRegistry<AppError>) {
  tracing::info!("Registering flows...");

  stk_push_pipeline::register_stk_push_flow(registry);
  checkout_pipeline::register_checkout_flow(registry);
  callback_pipeline::register_callback_flow(registry);
  approval_pipeline::register_approval_flow(registry);
  support_ticket_pipeline::register_support_ticket_flow(registry);
  admin_reply_pipeline::register_admin_reply_flow(registry);
  telegram_pipeline::register_telegram_flow(registry);

  tracing::info!(flows = registry.len(), "All flows registered.");
}
