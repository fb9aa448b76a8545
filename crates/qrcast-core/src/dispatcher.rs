//! Routes incoming updates to the QR and admin handlers.
//!
//! Priority: `/start`, `/admin`, button presses, then plain text. Plain text
//! from an admin whose session is armed is a broadcast payload; any other
//! text is a QR request.

use std::{sync::Arc, time::Duration};

use crate::{
    broadcast::{fan_out, BroadcastJob, BroadcastSummary},
    config::Config,
    domain::{ChatId, UserId},
    formatting::{escape_html, truncate_text},
    messaging::{
        port::MessagingPort,
        types::{
            CallbackQuery, ChatAction, Command, IncomingUpdate, InlineButton, InlineKeyboard,
            TextMessage,
        },
    },
    qr::QrEncoder,
    registry::UserRegistry,
    session::AdminSessions,
    Result,
};

pub const CMD_START: &str = "start";
pub const CMD_ADMIN: &str = "admin";

pub const CB_STATS: &str = "stats";
pub const CB_BROADCAST: &str = "broadcast";

const WELCOME_TEXT: &str = "👋 Welcome! Send me any text and I will turn it into a QR code.";
const ADMIN_MENU_HTML: &str = "👑 <b>Admin panel</b>";
const STATS_FAILED_TEXT: &str = "⚠️ Could not read the user registry.";
const BROADCAST_PROMPT_TEXT: &str = "✍️ Send the message you want to broadcast to all users.";
const NO_USERS_TEXT: &str = "⚠️ There are no users to broadcast to.";
const CAPTION_PREFIX: &str = "QR code for:\n";

/// What a single `dispatch` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Welcomed,
    AdminMenu,
    /// Nothing visible happened (non-admin, unknown command or button).
    Ignored,
    /// `None` when the registry could not be read.
    Stats(Option<usize>),
    BroadcastArmed,
    Broadcast(BroadcastSummary),
    BroadcastNoUsers,
    BroadcastFailed,
    QrSent,
    QrFailed,
}

pub struct Dispatcher {
    admin_id: UserId,
    delivery_timeout: Duration,
    registry: Arc<dyn UserRegistry>,
    sessions: AdminSessions,
    messenger: Arc<dyn MessagingPort>,
    encoder: Arc<dyn QrEncoder>,
}

impl Dispatcher {
    pub fn new(
        cfg: &Config,
        registry: Arc<dyn UserRegistry>,
        messenger: Arc<dyn MessagingPort>,
        encoder: Arc<dyn QrEncoder>,
    ) -> Self {
        Self {
            admin_id: cfg.admin_id,
            delivery_timeout: cfg.delivery_timeout,
            registry,
            sessions: AdminSessions::new(),
            messenger,
            encoder,
        }
    }

    pub fn sessions(&self) -> &AdminSessions {
        &self.sessions
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        user == self.admin_id
    }

    pub async fn dispatch(&self, update: IncomingUpdate) -> Result<DispatchOutcome> {
        match update {
            IncomingUpdate::Command(cmd) => self.on_command(cmd).await,
            IncomingUpdate::Callback(q) => self.on_callback(q).await,
            IncomingUpdate::Text(msg) => self.on_text(msg).await,
        }
    }

    async fn on_command(&self, cmd: Command) -> Result<DispatchOutcome> {
        match cmd.name.as_str() {
            CMD_START => {
                self.register(cmd.user_id).await;
                self.messenger.send_text(cmd.chat_id, WELCOME_TEXT).await?;
                Ok(DispatchOutcome::Welcomed)
            }
            CMD_ADMIN => {
                if !self.is_admin(cmd.user_id) {
                    tracing::debug!(user = %cmd.user_id, "ignoring /admin from non-admin");
                    return Ok(DispatchOutcome::Ignored);
                }
                self.messenger
                    .send_inline_keyboard(cmd.chat_id, ADMIN_MENU_HTML, admin_keyboard())
                    .await?;
                Ok(DispatchOutcome::AdminMenu)
            }
            other => {
                tracing::debug!(command = other, "ignoring unknown command");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    async fn on_callback(&self, q: CallbackQuery) -> Result<DispatchOutcome> {
        if let Err(e) = self.messenger.answer_callback_query(&q.callback_id).await {
            tracing::warn!(error = %e, "failed to answer callback query");
        }

        if !self.is_admin(q.user_id) {
            tracing::debug!(user = %q.user_id, data = %q.data, "ignoring button from non-admin");
            return Ok(DispatchOutcome::Ignored);
        }

        match q.data.as_str() {
            CB_STATS => self.show_stats(q.chat_id).await,
            CB_BROADCAST => {
                self.sessions.begin_broadcast(q.user_id).await;
                self.messenger
                    .send_text(q.chat_id, BROADCAST_PROMPT_TEXT)
                    .await?;
                tracing::info!(user = %q.user_id, "awaiting broadcast text");
                Ok(DispatchOutcome::BroadcastArmed)
            }
            other => {
                tracing::debug!(data = other, "ignoring unknown button");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    async fn on_text(&self, msg: TextMessage) -> Result<DispatchOutcome> {
        if self.sessions.take_broadcast(msg.user_id).await {
            return self.run_broadcast(msg.chat_id, msg.text).await;
        }
        self.send_qr(msg).await
    }

    async fn show_stats(&self, chat_id: ChatId) -> Result<DispatchOutcome> {
        match self.registry.count().await {
            Ok(n) => {
                self.messenger
                    .send_text(chat_id, &format!("📊 Users: {n}"))
                    .await?;
                Ok(DispatchOutcome::Stats(Some(n)))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to count users");
                self.messenger.send_text(chat_id, STATS_FAILED_TEXT).await?;
                Ok(DispatchOutcome::Stats(None))
            }
        }
    }

    async fn run_broadcast(&self, admin_chat: ChatId, text: String) -> Result<DispatchOutcome> {
        let recipients = match self.registry.all_identities().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "failed to load users for broadcast");
                self.messenger.send_text(admin_chat, STATS_FAILED_TEXT).await?;
                return Ok(DispatchOutcome::BroadcastFailed);
            }
        };

        if recipients.is_empty() {
            self.messenger.send_text(admin_chat, NO_USERS_TEXT).await?;
            return Ok(DispatchOutcome::BroadcastNoUsers);
        }

        tracing::info!(recipients = recipients.len(), "starting broadcast");
        let job = BroadcastJob { text, recipients };
        let summary = fan_out(self.messenger.as_ref(), &job, self.delivery_timeout).await;

        self.messenger
            .send_text(
                admin_chat,
                &format!(
                    "✅ Message delivered to {} of {} users.",
                    summary.delivered, summary.attempted
                ),
            )
            .await?;
        Ok(DispatchOutcome::Broadcast(summary))
    }

    async fn send_qr(&self, msg: TextMessage) -> Result<DispatchOutcome> {
        self.register(msg.user_id).await;

        if let Err(e) = self
            .messenger
            .send_chat_action(msg.chat_id, ChatAction::UploadPhoto)
            .await
        {
            tracing::debug!(error = %e, "chat action failed");
        }

        let png = match self.encoder.encode(&msg.text) {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(user = %msg.user_id, error = %e, "qr encoding failed");
                let html = format!(
                    "❌ Could not generate a QR code for this text.\n<code>{}</code>",
                    escape_html(&e.to_string())
                );
                self.messenger.send_html(msg.chat_id, &html).await?;
                return Ok(DispatchOutcome::QrFailed);
            }
        };

        let caption = self.caption_for(&msg.text);
        self.messenger.send_photo(msg.chat_id, png, &caption).await?;
        Ok(DispatchOutcome::QrSent)
    }

    fn caption_for(&self, text: &str) -> String {
        // Telegram measures the limit in UTF-16 units after entity parsing,
        // i.e. without tags and with entities decoded.
        let limit = self.messenger.capabilities().max_caption_len;
        let budget = limit
            .saturating_sub(CAPTION_PREFIX.encode_utf16().count())
            .saturating_sub(3);
        format!(
            "{CAPTION_PREFIX}<code>{}</code>",
            escape_html(&truncate_text(text, budget))
        )
    }

    async fn register(&self, user: UserId) {
        match self.registry.record(user).await {
            Ok(true) => tracing::info!(user = %user, "new user"),
            Ok(false) => {}
            Err(e) => tracing::warn!(user = %user, error = %e, "failed to record user"),
        }
    }
}

pub fn admin_keyboard() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        InlineButton::new("📊 Statistics", CB_STATS),
        InlineButton::new("📣 Broadcast message", CB_BROADCAST),
    ])
}
