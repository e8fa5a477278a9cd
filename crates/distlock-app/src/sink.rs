//! Notification sink.
//!
//! Everything the user sees ends up as a timestamped line with a [`Tone`].
//! How a tone is rendered (terminal color, CSS class) is up to the sink.

use distlock_client::{AuditEvent, Info};
use distlock_proto::Notification;

/// Kind of line, for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Outcome pushed by the service.
    Notification,
    /// Local record of a user action.
    Audit,
    /// Channel status.
    Info,
    /// Input rejected locally.
    Error,
}

impl Tone {
    /// Conventional color name.
    pub fn color(self) -> &'static str {
        match self {
            Self::Notification => "red",
            Self::Audit => "blue",
            Self::Info => "default",
            Self::Error => "yellow",
        }
    }
}

/// Consumer of everything the client wants to show.
pub trait NotificationSink {
    /// A decoded service notification.
    fn notification(&mut self, notification: &Notification);

    /// A user action was issued.
    fn audit(&mut self, event: &AuditEvent);

    /// Channel status changed.
    fn info(&mut self, info: &Info);

    /// User input was refused before anything was sent.
    fn rejected(&mut self, reason: &str);
}

/// Display text of a notification line: `STATUS: message`.
pub fn notification_text(notification: &Notification) -> String {
    format!("{}: {}", notification.status, notification.message)
}
