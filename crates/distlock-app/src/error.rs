//! Runtime error type.

use distlock_core::ConnectionError;
use thiserror::Error;

/// Errors that stop the runtime.
///
/// Everything the user can cause is reported through the sink instead;
/// these are frontend failures and broken state machine invariants.
#[derive(Debug, Error)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// The driver failed to read input or render.
    #[error("driver error: {0}")]
    Driver(#[source] E),

    /// The connection state machine rejected a lifecycle transition.
    #[error("channel error: {0}")]
    Channel(#[from] ConnectionError),
}
