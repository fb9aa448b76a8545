//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into a core `IncomingUpdate` and
//! hands it to the dispatcher. Errors are logged here and never returned to
//! teloxide, so one bad update cannot stop polling.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use qrcast_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{self, Command, IncomingUpdate, TextMessage},
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = callback_update(&q) else {
        // No originating message (e.g. inline mode): just stop the spinner.
        if let Err(e) = state.messenger.answer_callback_query(&q.id).await {
            tracing::debug!(error = %e, "failed to answer orphan callback");
        }
        return Ok(());
    };
    run(update, state).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = message_update(&msg) else {
        tracing::debug!(chat = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };
    run(update, state).await;
    Ok(())
}

async fn run(update: IncomingUpdate, state: Arc<AppState>) {
    let user = update.user_id();
    match state.dispatcher.dispatch(update).await {
        Ok(outcome) => tracing::debug!(user = %user, ?outcome, "update handled"),
        Err(e) => tracing::error!(user = %user, error = %e, "update handling failed"),
    }
}

fn message_update(msg: &Message) -> Option<IncomingUpdate> {
    let user = msg.from()?;
    let text = msg.text()?;

    let chat_id = ChatId(msg.chat.id.0);
    let user_id = UserId(user.id.0 as i64);
    let username = user.username.clone();

    if let Some(cmd) = Command::parse(chat_id, user_id, username.clone(), text) {
        return Some(IncomingUpdate::Command(cmd));
    }

    Some(IncomingUpdate::Text(TextMessage {
        chat_id,
        user_id,
        username,
        text: text.to_string(),
    }))
}

fn callback_update(q: &CallbackQuery) -> Option<IncomingUpdate> {
    let msg = q.message.as_ref()?;
    let chat_id = ChatId(msg.chat.id.0);

    Some(IncomingUpdate::Callback(types::CallbackQuery {
        chat_id,
        user_id: UserId(q.from.id.0 as i64),
        username: q.from.username.clone(),
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message: Some(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }),
    }))
}
