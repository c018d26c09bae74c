//! Telegram update handlers.
//!
//! Each handler normalizes a teloxide update into the core event taxonomy and
//! hands it to the controller; commands are dispatched separately.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use bcb_core::{
    composer::InboundEvent,
    controller::EventContext,
    domain::{ChatId, UserId},
};

use crate::router::AppState;

mod callback;
mod commands;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // The composer is a one-to-one flow; group chats are routed elsewhere.
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(owner) = msg.from().map(|u| UserId(u.id.0 as i64)) else {
        return Ok(());
    };

    if let Some(text) = msg.text().map(|s| s.to_string()) {
        if text.starts_with('/') {
            return commands::handle_command(msg, text, state).await;
        }
    }

    let Some(event) = event_from_message(&msg) else {
        return Ok(());
    };

    let ctx = EventContext {
        owner,
        chat: ChatId(msg.chat.id.0),
        preview: None,
    };
    state.controller.handle_event(ctx, event).await;
    Ok(())
}

fn event_from_message(msg: &Message) -> Option<InboundEvent> {
    if let Some(text) = msg.text() {
        let entities = msg
            .entities()
            .unwrap_or(&[])
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect();
        return Some(InboundEvent::Text {
            content: text.to_string(),
            entities,
        });
    }

    if let Some(sizes) = msg.photo() {
        // Sizes are ordered smallest first; the last one is worth reposting.
        let best = sizes.last()?;
        return Some(InboundEvent::Photo {
            handle: best.file.id.clone(),
        });
    }

    if let Some(video) = msg.video() {
        return Some(InboundEvent::Video {
            handle: video.file.id.clone(),
        });
    }

    None
}
