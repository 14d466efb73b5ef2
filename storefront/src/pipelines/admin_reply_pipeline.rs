// storefront/src/pipelines/admin_reply_pipeline.rs

//! Ticket replies typed into the back-office instead of the operator chat.

use crate::errors::{AppError, Result};
use crate::models::order::short_id;
use crate::pipelines::contexts::AdminTicketReplyCtx;
use crate::pipelines::telegram_pipeline::reply_to_customer_text;
use hatua::{Control, Flow, FlowCtx, FlowRegistry, StepSpec};
use tracing::{info, instrument, warn};

pub fn register_admin_reply_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<AdminTicketReplyCtx, AppError>::new(
    "admin_ticket_reply",
    vec![
      StepSpec::required("record_reply"),
      StepSpec::optional("relay_reply").skip_if(|c: &AdminTicketReplyCtx| {
        c.ticket.as_ref().map_or(true, |t| t.is_from_web())
      }),
    ],
  );
  flow.before("record_reply", |ctx: FlowCtx<AdminTicketReplyCtx>| async move {
    let empty = ctx.read().reply.trim().is_empty();
    if empty {
      return Err(AppError::Validation("Reply is required".to_string()));
    }
    Ok(Control::Next)
  });
  flow.on("record_reply", record_reply);
  flow.on("relay_reply", relay_reply);
  registry.register(flow);
}

#[instrument(name = "admin_reply::record", skip(ctx), err)]
async fn record_reply(ctx: FlowCtx<AdminTicketReplyCtx>) -> Result<Control> {
  let (store, ticket_id, reply) = ctx.snapshot(|c| (c.app_state.store.clone(), c.ticket_id, c.reply.trim().to_string()));
  let ticket = store
    .record_admin_reply(ticket_id, &reply)
    .await?
    .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
  info!(ticket = %short_id(&ticket.id), "Admin reply stored.");
  ctx.update(|c| c.ticket = Some(ticket));
  Ok(Control::Next)
}

#[instrument(name = "admin_reply::relay", skip(ctx))]
async fn relay_reply(ctx: FlowCtx<AdminTicketReplyCtx>) -> Result<Control> {
  let (app_state, ticket, reply) = ctx.snapshot(|c| (c.app_state.clone(), c.ticket.clone(), c.reply.trim().to_string()));
  let Some(ticket) = ticket else {
    return Ok(Control::Next);
  };
  let Ok((messenger, _)) = app_state.telegram() else {
    warn!(ticket = %short_id(&ticket.id), "Telegram not configured; reply stored but not relayed.");
    return Ok(Control::Next);
  };
  match messenger
    .send_message(ticket.telegram_chat_id, &reply_to_customer_text(&reply), None)
    .await
  {
    Ok(_) => ctx.update(|c| c.relayed = true),
    Err(e) => warn!(ticket = %short_id(&ticket.id), error = %e, "Reply stored but not delivered."),
  }
  Ok(Control::Next)
}
