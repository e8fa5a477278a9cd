//! Protocol error types.

use thiserror::Error;

use crate::request::Action;

/// Errors raised while encoding or decoding protocol frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not valid JSON or does not match the expected schema.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Notification `time` is not a usable epoch value.
    #[error("invalid time value: {value}")]
    InvalidTime {
        /// The offending value, as received.
        value: String,
    },

    /// A lock name list contained no names.
    #[error("no lock names in {input:?}")]
    EmptyLockNames {
        /// The text that was split.
        input: String,
    },

    /// Request carried the wrong number of parameters for its action.
    #[error("action {action} expects {expected} param(s), got {actual}")]
    Arity {
        /// Action named in the frame.
        action: Action,
        /// Human-readable expected count.
        expected: &'static str,
        /// Number of params actually present.
        actual: usize,
    },
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_display() {
        let err = ProtocolError::Arity { action: Action::Lock, expected: "exactly 1", actual: 2 };
        assert_eq!(err.to_string(), "action lock expects exactly 1 param(s), got 2");
    }
}
