//! Connection and transport error types.

use thiserror::Error;

use crate::{connection::ConnectionState, transport::TransportKind};

/// Errors from the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// A frame was offered for sending while the channel was not open.
    #[error("channel is not open (state: {state})")]
    NotOpen {
        /// State at the time of the send.
        state: ConnectionState,
    },

    /// A frame arrived while the channel was not open.
    #[error("unexpected frame in state {state}")]
    UnexpectedFrame {
        /// State at the time of receipt.
        state: ConnectionState,
    },

    /// Transition not valid from the current state.
    #[error("invalid state {state} for {operation}")]
    InvalidState {
        /// Current state.
        state: ConnectionState,
        /// Attempted operation.
        operation: String,
    },
}

impl ConnectionError {
    /// Returns true if the channel can never carry traffic again.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::NotOpen { state }
            | Self::UnexpectedFrame { state }
            | Self::InvalidState { state, .. } => state.is_terminal(),
        }
    }
}

/// Errors from concrete transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not be established.
    #[error("{transport} unavailable: {reason}")]
    Unavailable {
        /// Transport that was attempted.
        transport: TransportKind,
        /// Underlying failure.
        reason: String,
    },

    /// The endpoint cannot be used with this transport.
    #[error("invalid endpoint: {reason}")]
    InvalidEndpoint {
        /// Description of the problem.
        reason: String,
    },

    /// Writing a frame failed.
    #[error("send failed: {reason}")]
    Send {
        /// Underlying failure.
        reason: String,
    },

    /// The link is already closed.
    #[error("link closed")]
    Closed,
}
