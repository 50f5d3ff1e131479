//! User-visible notifications
//!
//! Component boundaries report failures here in addition to logging them.
//! The game forwards these to chat; the player binary just logs them.

/// Severity of a user-visible message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Sink for user-visible messages (chat, HUD, console)
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Forwards notifications to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => tracing::info!(target: "cubesound::chat", "{}", message),
            NoticeLevel::Warning => tracing::warn!(target: "cubesound::chat", "{}", message),
            NoticeLevel::Error => tracing::error!(target: "cubesound::chat", "{}", message),
        }
    }
}
