//! Best-effort fan-out of one text to every registered user.
//!
//! Deliveries run one after another. A failed or timed-out delivery is
//! recorded and the loop moves on; nothing is retried.

use std::time::Duration;

use crate::{
    domain::{ChatId, UserId},
    messaging::port::MessagingPort,
};

/// Payload plus the registry snapshot taken when the broadcast started.
#[derive(Clone, Debug)]
pub struct BroadcastJob {
    pub text: String,
    pub recipients: Vec<UserId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub user: UserId,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl BroadcastSummary {
    fn push(&mut self, user: UserId, outcome: DeliveryOutcome) {
        self.attempted += 1;
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Failed { reason } => {
                self.failures.push(DeliveryFailure { user, reason })
            }
        }
    }
}

/// Single attempt, bounded by `timeout`.
pub async fn deliver(
    messenger: &dyn MessagingPort,
    user: UserId,
    text: &str,
    timeout: Duration,
) -> DeliveryOutcome {
    match tokio::time::timeout(timeout, messenger.send_text(ChatId::from(user), text)).await {
        Ok(Ok(_)) => DeliveryOutcome::Delivered,
        Ok(Err(e)) => DeliveryOutcome::Failed {
            reason: e.to_string(),
        },
        Err(_) => DeliveryOutcome::Failed {
            reason: format!("timed out after {}ms", timeout.as_millis()),
        },
    }
}

pub async fn fan_out(
    messenger: &dyn MessagingPort,
    job: &BroadcastJob,
    timeout: Duration,
) -> BroadcastSummary {
    let mut summary = BroadcastSummary::default();

    for &user in &job.recipients {
        let outcome = deliver(messenger, user, &job.text, timeout).await;
        if let DeliveryOutcome::Failed { reason } = &outcome {
            tracing::warn!(user = %user, %reason, "broadcast delivery failed");
        }
        summary.push(user, outcome);
    }

    tracing::info!(
        attempted = summary.attempted,
        delivered = summary.delivered,
        "broadcast finished"
    );
    summary
}
