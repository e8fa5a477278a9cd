//! Driver trait for abstracting user-facing I/O.
//!
//! The [`Driver`] trait decouples the application runtime from a specific
//! frontend. Each frontend implements the trait to provide input lines and a
//! notification sink, while the generic [`crate::Runtime`] handles all
//! orchestration. Network I/O goes through [`distlock_core::Transport`]
//! instead.

use std::future::Future;

use crate::{App, NotificationSink};

/// Abstracts user-facing I/O for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`crate::Runtime`] handles orchestration logic. This ensures the same
/// orchestration code runs in the terminal frontend and in tests.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Where notifications, audits and info lines go.
    type Sink: NotificationSink;

    /// Wait for the next input line.
    ///
    /// Returns `None` once input is exhausted. Must be cancel safe: the
    /// runtime races it against the network in `select!`.
    fn next_input(&mut self) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// The notification sink.
    fn sink(&mut self) -> &mut Self::Sink;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Release frontend resources.
    fn stop(&mut self);
}
