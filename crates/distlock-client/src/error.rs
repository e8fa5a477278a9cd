//! Client error types.

use distlock_core::{ConnectionError, ConnectionState};
use distlock_proto::ProtocolError;
use thiserror::Error;

/// Errors from the lock client state machine.
#[derive(Debug, Error)]
pub enum ClientError {
    /// User-supplied name or name list is unusable.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// The channel is not open, so no request was built.
    #[error("channel unavailable (state: {state})")]
    ChannelUnavailable {
        /// Channel state when the request was attempted.
        state: ConnectionState,
    },

    /// Lock action attempted without an identity while unauthenticated
    /// requests are rejected.
    #[error("not authenticated: identify before locking")]
    NotAuthenticated,

    /// Channel state machine rejected the operation.
    #[error("channel error: {0}")]
    Channel(#[from] ConnectionError),

    /// Encoding or decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Returns true if the client can no longer issue requests on this
    /// channel.
    ///
    /// Input, policy and protocol errors are corrected locally. Channel errors
    /// are fatal only once the channel has reached a terminal state.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidInput { .. } | Self::NotAuthenticated | Self::Protocol(_) => false,
            Self::ChannelUnavailable { state } => state.is_terminal(),
            Self::Channel(err) => err.is_terminal(),
        }
    }
}
