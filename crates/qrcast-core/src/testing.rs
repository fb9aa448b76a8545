//! Test doubles shared by the unit tests of this crate.

use std::{
    collections::HashSet,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, MessagingCapabilities},
    },
    qr::QrEncoder,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text(ChatId, String),
    Html(ChatId, String),
    Photo {
        chat_id: ChatId,
        png: Vec<u8>,
        caption: String,
    },
    Keyboard(ChatId, String, InlineKeyboard),
    Action(ChatId, ChatAction),
    CallbackAnswer(String),
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<Sent>>,
    text_attempts: Mutex<Vec<ChatId>>,
    failing: Mutex<HashSet<ChatId>>,
    slow: Mutex<HashSet<ChatId>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// `send_text` to this chat fails like a blocked bot.
    pub fn fail_for(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    /// `send_text` to this chat hangs far longer than any test timeout.
    pub fn stall_for(&self, chat_id: ChatId) {
        self.slow.lock().unwrap().insert(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn text_attempts(&self) -> Vec<ChatId> {
        self.text_attempts.lock().unwrap().clone()
    }

    /// Plain and HTML messages sent to `chat_id`, in order.
    pub fn messages_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(c, t) | Sent::Html(c, t) if c == chat_id => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn photos_to(&self, chat_id: ChatId) -> Vec<(Vec<u8>, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Photo {
                    chat_id: c,
                    png,
                    caption,
                } if c == chat_id => Some((png, caption)),
                _ => None,
            })
            .collect()
    }

    pub fn keyboards_to(&self, chat_id: ChatId) -> Vec<InlineKeyboard> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Keyboard(c, _, kb) if c == chat_id => Some(kb),
                _ => None,
            })
            .collect()
    }

    /// Everything except callback answers and chat actions.
    pub fn visible_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| !matches!(s, Sent::CallbackAnswer(..) | Sent::Action(..)))
            .count()
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    fn push(&self, s: Sent) {
        self.sent.lock().unwrap().push(s);
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_caption_len: 64,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.text_attempts.lock().unwrap().push(chat_id);
        let stalled = self.slow.lock().unwrap().contains(&chat_id);
        if stalled {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(Error::Delivery(
                "Forbidden: bot was blocked by the user".to_string(),
            ));
        }
        self.push(Sent::Text(chat_id, text.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.push(Sent::Html(chat_id, html.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        png: Vec<u8>,
        caption_html: &str,
    ) -> Result<MessageRef> {
        self.push(Sent::Photo {
            chat_id,
            png,
            caption: caption_html.to_string(),
        });
        Ok(self.alloc(chat_id))
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.push(Sent::Action(chat_id, action));
        Ok(())
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.push(Sent::Keyboard(chat_id, html.to_string(), keyboard));
        Ok(self.alloc(chat_id))
    }

    async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        self.push(Sent::CallbackAnswer(callback_id.to_string()));
        Ok(())
    }
}

/// Encodes text as `b"QR:" + text`; fails for text starting with `!fail`.
#[derive(Default)]
pub struct FakeEncoder;

impl QrEncoder for FakeEncoder {
    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        if text.starts_with("!fail") {
            return Err(Error::QrEncode("data too long".to_string()));
        }
        let mut out = b"QR:".to_vec();
        out.extend_from_slice(text.as_bytes());
        Ok(out)
    }
}
