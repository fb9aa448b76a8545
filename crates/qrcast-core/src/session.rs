use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::UserId;

/// How the next plain text from an admin is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdminState {
    #[default]
    Idle,
    AwaitingBroadcastText,
}

/// Per-admin session state, keyed by identity.
///
/// Entries are created lazily; a missing entry is `Idle`. Nothing here is
/// persisted across restarts.
#[derive(Debug, Default)]
pub struct AdminSessions {
    states: Mutex<HashMap<UserId, AdminState>>,
}

impl AdminSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, user: UserId) -> AdminState {
        self.states
            .lock()
            .await
            .get(&user)
            .copied()
            .unwrap_or_default()
    }

    /// Arm the session so the next text message becomes a broadcast payload.
    pub async fn begin_broadcast(&self, user: UserId) {
        self.states
            .lock()
            .await
            .insert(user, AdminState::AwaitingBroadcastText);
    }

    /// If `user` is awaiting broadcast text, reset to `Idle` and return `true`.
    pub async fn take_broadcast(&self, user: UserId) -> bool {
        let mut states = self.states.lock().await;
        match states.get_mut(&user) {
            Some(state) if *state == AdminState::AwaitingBroadcastText => {
                *state = AdminState::Idle;
                true
            }
            _ => false,
        }
    }
}
