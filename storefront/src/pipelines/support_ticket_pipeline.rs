// storefront/src/pipelines/support_ticket_pipeline.rs

//! Web support tickets. The ticket is stored first; the operator notice is
//! best effort and its message id becomes the reply correlation key.

use crate::errors::{AppError, Result};
use crate::models::order::short_id;
use crate::models::ticket::{NewTicket, SupportTicket, TicketCategory, TicketSource, WebIdentity};
use crate::pipelines::contexts::SupportTicketCtx;
use crate::services::telegram::escape_html;
use crate::validation;
use hatua::{Control, Flow, FlowCtx, FlowRegistry, StepSpec};
use std::str::FromStr;
use tracing::{info, instrument, warn};

pub fn register_support_ticket_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<SupportTicketCtx, AppError>::new(
    "support_ticket",
    vec![
      StepSpec::required("validate_ticket"),
      StepSpec::required("store_ticket"),
      StepSpec::optional("notify_operator"),
    ],
  );
  flow.before("validate_ticket", |ctx: FlowCtx<SupportTicketCtx>| async move {
    ctx.read().app_state.telegram().map(|_| Control::Next)
  });
  flow.on("validate_ticket", validate_ticket);
  flow.on("store_ticket", store_ticket);
  flow.on("notify_operator", notify_operator);
  registry.register(flow);
}

fn email_local_part(email: Option<&str>) -> Option<String> {
  email
    .and_then(|e| e.split('@').next())
    .filter(|local| !local.is_empty())
    .map(str::to_string)
}

/// Operator-facing notice for a ticket raised from the website.
pub fn web_ticket_notice(ticket: &SupportTicket, user_name: Option<&str>, user_email: Option<&str>) -> String {
  format!(
    "🌐 <b>WEB TICKET</b>\n👤 {}\n📧 {}\n📋 {}\n\n💬 {}\n\n<i>Reply to this message to respond (ID: {})</i>",
    escape_html(user_name.unwrap_or("Unknown")),
    escape_html(user_email.unwrap_or("N/A")),
    ticket.category.label(),
    escape_html(&ticket.message),
    short_id(&ticket.id),
  )
}

#[instrument(name = "support_ticket::validate", skip(ctx), err)]
async fn validate_ticket(ctx: FlowCtx<SupportTicketCtx>) -> Result<Control> {
  let form = ctx.snapshot(|c| c.form.clone());
  let (Some(category), Some(message)) = (form.category.as_deref(), form.message.as_deref()) else {
    return Err(AppError::Validation("Category and message required".to_string()));
  };
  let category = TicketCategory::from_str(category).map_err(AppError::Validation)?;
  let message = validation::support_message(message)?;
  ctx.update(|c| {
    c.category = Some(category);
    c.message = message;
  });
  Ok(Control::Next)
}

#[instrument(name = "support_ticket::store", skip(ctx), err)]
async fn store_ticket(ctx: FlowCtx<SupportTicketCtx>) -> Result<Control> {
  let (store, new_ticket) = ctx.snapshot(|c| {
    let identity = WebIdentity::for_user(c.user.user_id);
    let email = c.form.user_email.as_deref().or(c.user.email.as_deref());
    let local = email_local_part(email);
    let first_name = c
      .form
      .user_name
      .clone()
      .filter(|n| !n.trim().is_empty())
      .or_else(|| local.clone())
      .unwrap_or_else(|| "Web User".to_string());
    (
      c.app_state.store.clone(),
      c.category.map(|category| NewTicket {
        user_id: Some(c.user.user_id),
        source: TicketSource::Web,
        telegram_chat_id: identity.chat_id,
        telegram_user_id: identity.user_id,
        telegram_username: local,
        telegram_first_name: Some(first_name),
        category,
        message: c.message.clone(),
      }),
    )
  });
  let new_ticket = new_ticket.ok_or_else(|| AppError::Internal("Ticket not validated".to_string()))?;

  let ticket = store.insert_ticket(new_ticket).await?;
  info!(ticket = %short_id(&ticket.id), category = ticket.category.id(), "Support ticket stored.");
  ctx.update(|c| c.ticket = Some(ticket));
  Ok(Control::Next)
}

#[instrument(name = "support_ticket::notify_operator", skip(ctx))]
async fn notify_operator(ctx: FlowCtx<SupportTicketCtx>) -> Result<Control> {
  let (app_state, ticket, user_name, user_email) = ctx.snapshot(|c| {
    (
      c.app_state.clone(),
      c.ticket.clone(),
      c.form.user_name.clone(),
      c.form.user_email.clone().or_else(|| c.user.email.clone()),
    )
  });
  let Some(ticket) = ticket else {
    return Ok(Control::Next);
  };
  let (messenger, admin_chat_id) = app_state.telegram()?;

  let notice = web_ticket_notice(&ticket, user_name.as_deref(), user_email.as_deref());
  match messenger.send_message(admin_chat_id, &notice, None).await {
    Ok(message_id) => {
      app_state.store.attach_admin_message(ticket.id, message_id).await?;
      ctx.update(|c| {
        c.operator_notified = true;
        if let Some(t) = c.ticket.as_mut() {
          t.admin_message_id = Some(message_id);
        }
      });
    }
    Err(e) => {
      warn!(ticket = %short_id(&ticket.id), error = %e, "Operator notification failed; ticket kept.");
    }
  }
  Ok(Control::Next)
}
