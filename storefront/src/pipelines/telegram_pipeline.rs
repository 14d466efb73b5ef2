// storefront/src/pipelines/telegram_pipeline.rs

//! Support bot webhook. Each update is classified once, then exactly one
//! handler step runs for its kind; the rest are skipped.

use crate::errors::{AppError, Result};
use crate::models::order::short_id;
use crate::models::ticket::{NewTicket, SupportTicket, TicketCategory, TicketSource};
use crate::pipelines::contexts::{TelegramUpdateCtx, UpdateKind};
use crate::services::telegram::{escape_html, CallbackQuery, Message};
use crate::services::InlineButton;
use crate::validation;
use hatua::{Control, Flow, FlowCtx, FlowRegistry, StepSpec};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, instrument, warn};

const CATEGORY_PREFIX: &str = "category_";
const PREVIEW_CHARS: usize = 100;

/// Per-chat conversation state: the category picked from the menu, waiting for
/// the message text. Local to this process.
#[derive(Default)]
pub struct BotSessions {
  chosen: Mutex<HashMap<i64, TicketCategory>>,
}

impl BotSessions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&self, chat_id: i64) {
    self.chosen.lock().remove(&chat_id);
  }

  pub fn choose(&self, chat_id: i64, category: TicketCategory) {
    self.chosen.lock().insert(chat_id, category);
  }

  pub fn chosen(&self, chat_id: i64) -> Option<TicketCategory> {
    self.chosen.lock().get(&chat_id).copied()
  }

  pub fn len(&self) -> usize {
    self.chosen.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

pub fn register_telegram_flow(registry: &FlowRegistry<AppError>) {
  fn unless(kind: UpdateKind) -> impl Fn(&TelegramUpdateCtx) -> bool + Send + Sync + 'static {
    move |c: &TelegramUpdateCtx| c.kind != kind
  }

  let mut flow = Flow::<TelegramUpdateCtx, AppError>::new(
    "telegram_update",
    vec![
      StepSpec::required("classify_update"),
      StepSpec::required("operator_reply").skip_if(unless(UpdateKind::OperatorReply)),
      StepSpec::required("start_menu").skip_if(unless(UpdateKind::Start)),
      StepSpec::required("help").skip_if(unless(UpdateKind::Help)),
      StepSpec::required("category_chosen").skip_if(unless(UpdateKind::CategoryChosen)),
      StepSpec::required("support_message").skip_if(unless(UpdateKind::SupportMessage)),
    ],
  );
  flow.on("classify_update", classify_update);
  flow.on("operator_reply", operator_reply);
  flow.on("start_menu", start_menu);
  flow.on("help", help);
  flow.on("category_chosen", category_chosen);
  flow.on("support_message", support_message);
  registry.register(flow);
}

// --- Message texts ---

fn welcome_text(first_name: &str) -> String {
  format!(
    "👋 <b>Welcome to Remote Work Hub Support, {}!</b>\n\nWe're here to help you with any questions or issues. \
     Please select the type of support you need:",
    escape_html(first_name)
  )
}

const HELP_TEXT: &str = "🆘 <b>How to use Remote Work Hub Support Bot</b>\n\n\
1️⃣ Use /start to begin a new support request\n\
2️⃣ Select the category that best describes your issue\n\
3️⃣ Type your message with as much detail as possible\n\
4️⃣ Our support team will respond as soon as possible\n\n\
<b>Available Commands:</b>\n\
/start - Start a new support request\n\
/help - Show this help message";

pub const TICKET_NOT_FOUND_TEXT: &str = "❌ Could not find the original ticket for this reply.";

fn category_menu() -> Vec<InlineButton> {
  TicketCategory::ALL
    .iter()
    .map(|c| InlineButton {
      text: c.menu_label().to_string(),
      callback_data: format!("{}{}", CATEGORY_PREFIX, c.id()),
    })
    .collect()
}

fn preview(text: &str) -> String {
  let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
  if text.chars().count() > PREVIEW_CHARS {
    out.push_str("...");
  }
  out
}

/// Message the customer receives when an operator answers their ticket.
pub fn reply_to_customer_text(reply: &str) -> String {
  format!(
    "📩 <b>Reply from Remote Work Hub Support</b>\n\n{}\n\nNeed more help? Use /start to send another request.",
    escape_html(reply)
  )
}

fn operator_notice(ticket: &SupportTicket, full_name: &str, username: Option<&str>) -> String {
  let username = username.map(|u| format!("@{}", u)).unwrap_or_else(|| "No username".to_string());
  format!(
    "🆕 <b>NEW SUPPORT REQUEST</b>\n\n👤 <b>User:</b> {}\n🔗 <b>Username:</b> {}\n🆔 <b>Telegram ID:</b> <code>{}</code>\n\n\
     📋 <b>Category:</b> {}\n\n💬 <b>Message:</b>\n{}\n\n━━━━━━━━━━━━━━━━━━\n\
     <i>Reply to this message to respond to the user (ID: {})</i>",
    escape_html(full_name),
    escape_html(&username),
    ticket.telegram_user_id,
    ticket.category.menu_label(),
    escape_html(&ticket.message),
    short_id(&ticket.id),
  )
}

// --- Steps ---

fn classify(message: Option<&Message>, callback: Option<&CallbackQuery>, admin_chat_id: i64) -> UpdateKind {
  if let Some(cb) = callback {
    return match cb.data.as_deref() {
      Some(data) if data.starts_with(CATEGORY_PREFIX) => UpdateKind::CategoryChosen,
      _ => UpdateKind::Ignored,
    };
  }
  let Some(message) = message else {
    return UpdateKind::Ignored;
  };
  let Some(text) = message.text.as_deref() else {
    return UpdateKind::Ignored;
  };
  if message.chat.id == admin_chat_id && message.reply_to_message.is_some() {
    return UpdateKind::OperatorReply;
  }
  match text.trim() {
    "/start" => UpdateKind::Start,
    "/help" => UpdateKind::Help,
    _ => UpdateKind::SupportMessage,
  }
}

#[instrument(name = "telegram::classify_update", skip(ctx), err)]
async fn classify_update(ctx: FlowCtx<TelegramUpdateCtx>) -> Result<Control> {
  let (_, admin_chat_id) = ctx.snapshot(|c| c.app_state.telegram())?;
  let kind = ctx.snapshot(|c| {
    classify(
      c.update.message.as_ref(),
      c.update.callback_query.as_ref(),
      admin_chat_id,
    )
  });
  info!(update_id = ctx.read().update.update_id, ?kind, "Telegram update classified.");
  ctx.update(|c| c.kind = kind);
  if kind == UpdateKind::Ignored {
    return Ok(Control::Halt);
  }
  Ok(Control::Next)
}

fn message_of(ctx: &FlowCtx<TelegramUpdateCtx>) -> Result<Message> {
  ctx
    .snapshot(|c| c.update.message.clone())
    .ok_or_else(|| AppError::Internal("Update carries no message".to_string()))
}

#[instrument(name = "telegram::operator_reply", skip(ctx), err)]
async fn operator_reply(ctx: FlowCtx<TelegramUpdateCtx>) -> Result<Control> {
  let app_state = ctx.snapshot(|c| c.app_state.clone());
  let (messenger, admin_chat_id) = app_state.telegram()?;
  let message = message_of(&ctx)?;
  let reply_text = message.text.clone().unwrap_or_default();
  let replied_to = message.reply_to_message.as_ref().map(|m| m.message_id).unwrap_or_default();

  let Some(ticket) = app_state.store.ticket_by_admin_message(replied_to).await? else {
    info!(replied_to, "Operator replied to a message with no ticket.");
    messenger.send_message(admin_chat_id, TICKET_NOT_FOUND_TEXT, None).await?;
    return Ok(Control::Next);
  };

  let ticket = app_state
    .store
    .record_admin_reply(ticket.id, &reply_text)
    .await?
    .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

  let confirmation = if ticket.is_from_web() {
    format!("✅ Reply saved to web ticket {}.", short_id(&ticket.id))
  } else {
    match messenger
      .send_message(ticket.telegram_chat_id, &reply_to_customer_text(&reply_text), None)
      .await
    {
      Ok(_) => format!(
        "✅ Reply sent to {}.",
        escape_html(ticket.telegram_first_name.as_deref().unwrap_or("the user"))
      ),
      Err(e) => {
        warn!(ticket = %short_id(&ticket.id), error = %e, "Could not relay reply to customer.");
        format!("⚠️ Reply saved to ticket {} but could not be delivered.", short_id(&ticket.id))
      }
    }
  };
  messenger.send_message(admin_chat_id, &confirmation, None).await?;
  info!(ticket = %short_id(&ticket.id), "Operator reply recorded.");
  ctx.update(|c| c.ticket = Some(ticket));
  Ok(Control::Next)
}

async fn send_start_menu(ctx: &FlowCtx<TelegramUpdateCtx>, chat_id: i64, first_name: &str) -> Result<()> {
  let app_state = ctx.snapshot(|c| c.app_state.clone());
  let (messenger, _) = app_state.telegram()?;
  app_state.bot_sessions.reset(chat_id);
  messenger
    .send_message(chat_id, &welcome_text(first_name), Some(&category_menu()))
    .await?;
  Ok(())
}

#[instrument(name = "telegram::start_menu", skip(ctx), err)]
async fn start_menu(ctx: FlowCtx<TelegramUpdateCtx>) -> Result<Control> {
  let message = message_of(&ctx)?;
  let first_name = message.from.as_ref().map(|u| u.first_name_or_default().to_string());
  send_start_menu(&ctx, message.chat.id, first_name.as_deref().unwrap_or("User")).await?;
  Ok(Control::Next)
}

#[instrument(name = "telegram::help", skip(ctx), err)]
async fn help(ctx: FlowCtx<TelegramUpdateCtx>) -> Result<Control> {
  let (messenger, _) = ctx.snapshot(|c| c.app_state.telegram())?;
  let message = message_of(&ctx)?;
  messenger.send_message(message.chat.id, HELP_TEXT, None).await?;
  Ok(Control::Next)
}

#[instrument(name = "telegram::category_chosen", skip(ctx), err)]
async fn category_chosen(ctx: FlowCtx<TelegramUpdateCtx>) -> Result<Control> {
  let app_state = ctx.snapshot(|c| c.app_state.clone());
  let (messenger, _) = app_state.telegram()?;
  let callback = ctx
    .snapshot(|c| c.update.callback_query.clone())
    .ok_or_else(|| AppError::Internal("Update carries no callback query".to_string()))?;
  let chat_id = callback.message.as_ref().map(|m| m.chat.id).unwrap_or(callback.from.id);
  let raw = callback
    .data
    .as_deref()
    .and_then(|d| d.strip_prefix(CATEGORY_PREFIX))
    .unwrap_or_default();

  let Ok(category) = TicketCategory::from_str(raw) else {
    messenger.answer_callback_query(&callback.id, "Unknown category").await?;
    return Ok(Control::Next);
  };
  messenger.answer_callback_query(&callback.id, "Category selected").await?;
  app_state.bot_sessions.choose(chat_id, category);

  let prompt = format!(
    "📋 <b>Category:</b> {}\n\nPlease describe your issue or question in detail. \
     Type your message below and I'll forward it to our support team:",
    category.menu_label()
  );
  messenger.send_message(chat_id, &prompt, None).await?;
  Ok(Control::Next)
}

#[instrument(name = "telegram::support_message", skip(ctx), err)]
async fn support_message(ctx: FlowCtx<TelegramUpdateCtx>) -> Result<Control> {
  let app_state = ctx.snapshot(|c| c.app_state.clone());
  let (messenger, admin_chat_id) = app_state.telegram()?;
  let message = message_of(&ctx)?;
  let chat_id = message.chat.id;
  let Some(from) = message.from.clone() else {
    return Ok(Control::Next);
  };

  let Some(category) = app_state.bot_sessions.chosen(chat_id) else {
    send_start_menu(&ctx, chat_id, from.first_name_or_default()).await?;
    return Ok(Control::Next);
  };

  let text = match validation::support_message(message.text.as_deref().unwrap_or_default()) {
    Ok(text) => text,
    Err(e) => {
      messenger.send_message(chat_id, &escape_html(&e.to_string()), None).await?;
      return Ok(Control::Next);
    }
  };

  let ticket = app_state
    .store
    .insert_ticket(NewTicket {
      user_id: None,
      source: TicketSource::Telegram,
      telegram_chat_id: chat_id,
      telegram_user_id: from.id,
      telegram_username: from.username.clone(),
      telegram_first_name: Some(from.first_name_or_default().to_string()),
      category,
      message: text.clone(),
    })
    .await?;
  app_state.bot_sessions.reset(chat_id);

  let notice = operator_notice(&ticket, &from.full_name(), from.username.as_deref());
  match messenger.send_message(admin_chat_id, &notice, None).await {
    Ok(message_id) => app_state.store.attach_admin_message(ticket.id, message_id).await?,
    Err(e) => warn!(ticket = %short_id(&ticket.id), error = %e, "Operator notification failed; ticket kept."),
  }

  let confirmation = format!(
    "✅ <b>Request Received!</b>\n\nThank you for contacting Remote Work Hub Support. We've received your message \
     and our team will respond shortly.\n\n📋 <b>Category:</b> {}\n📧 <b>Your message:</b> {}\n\n\
     Need to send another request? Use /start to begin again.",
    category.menu_label(),
    escape_html(&preview(&text)),
  );
  messenger.send_message(chat_id, &confirmation, None).await?;
  info!(ticket = %short_id(&ticket.id), category = category.id(), "Telegram support ticket stored.");
  ctx.update(|c| c.ticket = Some(ticket));
  Ok(Control::Next)
}
