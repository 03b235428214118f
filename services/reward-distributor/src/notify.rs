use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lucky_common::{ClaimStatus, WeekId};
use serde::Serialize;
use tracing::info;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    WinnerAnnounced {
        uid: String,
        week: WeekId,
        prize_amount: u64,
    },
    DrawFailed {
        email: String,
        week: WeekId,
        reason: String,
    },
    DrawReminder {
        email: String,
        week: WeekId,
        draw_at: DateTime<Utc>,
    },
    ClaimReminder {
        uid: String,
        week: WeekId,
        prize_amount: u64,
    },
    ClaimStatusChanged {
        uid: String,
        week: WeekId,
        status: ClaimStatus,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::WinnerAnnounced { .. } => "winner_announced",
            Notification::DrawFailed { .. } => "draw_failed",
            Notification::DrawReminder { .. } => "draw_reminder",
            Notification::ClaimReminder { .. } => "claim_reminder",
            Notification::ClaimStatusChanged { .. } => "claim_status_changed",
        }
    }
}

/// Outbound channel for user and admin notices. Delivery problems are the
/// implementation's to handle; callers never fail because of them.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes every notification to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let payload = serde_json::to_string(&notification).unwrap_or_default();
        info!(
            event = "lucky_notification",
            kind = notification.kind(),
            %payload,
            "notification dispatched"
        );
    }
}

/// Keeps notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.sent().iter().filter(|n| n.kind() == kind).count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
    }
}
