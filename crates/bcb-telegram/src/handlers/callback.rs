use std::sync::Arc;

use teloxide::prelude::*;

use bcb_core::{
    composer::InboundEvent,
    controller::EventContext,
    domain::{ChatId, MessageId, MessageRef, UserId},
};

use crate::{router::AppState, CANCEL_CALLBACK, CONFIRM_CALLBACK};

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();

    let event = match data.as_str() {
        CONFIRM_CALLBACK => InboundEvent::Confirm,
        CANCEL_CALLBACK => InboundEvent::Cancel,
        _ => {
            let _ = bot.answer_callback_query(cb_id).await;
            return Ok(());
        }
    };

    let Some(message) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };
    if !message.chat.is_private() {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    }

    // Ack the tap before the (possibly slow) delivery round trip.
    let _ = bot.answer_callback_query(cb_id).await;

    let chat = ChatId(message.chat.id.0);
    let ctx = EventContext {
        owner: UserId(q.from.id.0 as i64),
        chat,
        preview: Some(MessageRef {
            chat_id: chat,
            message_id: MessageId(message.id.0),
        }),
    };
    state.controller.handle_event(ctx, event).await;
    Ok(())
}
