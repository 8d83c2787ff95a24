//! User Notifications
//!
//! Non-blocking, toast-style messages emitted by long-running services. Each
//! per-file failure, a summary failure and a completed run produce one
//! notification apiece.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// One discrete user-visible message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Sink for notifications. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Info => info!(title = %n.title, "{}", n.message),
            NotificationLevel::Warning => warn!(title = %n.title, "{}", n.message),
            NotificationLevel::Error => error!(title = %n.title, "{}", n.message),
        }
    }
}

/// Forwards notifications to an unbounded channel, for a UI event loop
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // receiver gone: nobody is listening any more
        let _ = self.tx.send(notification);
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    items: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.items.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.notifications()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut items) = self.items.lock() {
            items.push(notification);
        }
    }
}
