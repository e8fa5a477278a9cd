//! Requests sent from the client to the lock service.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    names::LockNames,
};

/// The six request actions understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Open a named session.
    Connect,
    /// Close the named session.
    Close,
    /// Acquire one lock.
    Lock,
    /// Release one lock.
    Unlock,
    /// Acquire several locks.
    Mlock,
    /// Release several locks.
    Munlock,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Close => "close",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Mlock => "mlock",
            Self::Munlock => "munlock",
        }
    }

    /// Whether the action takes a list of names rather than exactly one.
    pub fn is_batch(self) -> bool {
        matches!(self, Self::Mlock | Self::Munlock)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request.
///
/// Single-name variants always serialize to exactly one parameter; the batch
/// variants serialize to one or more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Identify as `name`.
    Connect {
        /// Display name.
        name: String,
    },
    /// Close the session opened for `name`.
    Close {
        /// Display name.
        name: String,
    },
    /// Acquire lock `name`.
    Lock {
        /// Lock name.
        name: String,
    },
    /// Release lock `name`.
    Unlock {
        /// Lock name.
        name: String,
    },
    /// Acquire every lock in `names`.
    MultiLock {
        /// Lock names, in input order.
        names: LockNames,
    },
    /// Release every lock in `names`.
    MultiUnlock {
        /// Lock names, in input order.
        names: LockNames,
    },
}

#[derive(Serialize)]
struct WireRequest<'a> {
    action: Action,
    params: &'a [String],
}

#[derive(Deserialize)]
struct OwnedWireRequest {
    action: Action,
    params: Vec<String>,
}

impl Request {
    /// Action tag of this request.
    pub fn action(&self) -> Action {
        match self {
            Self::Connect { .. } => Action::Connect,
            Self::Close { .. } => Action::Close,
            Self::Lock { .. } => Action::Lock,
            Self::Unlock { .. } => Action::Unlock,
            Self::MultiLock { .. } => Action::Mlock,
            Self::MultiUnlock { .. } => Action::Munlock,
        }
    }

    /// Parameters in wire order.
    pub fn params(&self) -> &[String] {
        match self {
            Self::Connect { name }
            | Self::Close { name }
            | Self::Lock { name }
            | Self::Unlock { name } => std::slice::from_ref(name),
            Self::MultiLock { names } | Self::MultiUnlock { names } => names.as_slice(),
        }
    }

    /// Serialize to the JSON wire format.
    pub fn encode(&self) -> Result<String> {
        let wire = WireRequest { action: self.action(), params: self.params() };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse a request frame, checking parameter arity.
    ///
    /// The client never decodes requests; this exists for simulated services
    /// and diagnostics.
    pub fn decode(raw: &str) -> Result<Self> {
        let wire: OwnedWireRequest = serde_json::from_str(raw)?;
        let actual = wire.params.len();

        if wire.action.is_batch() {
            let names = LockNames::from_names(wire.params).map_err(|_| ProtocolError::Arity {
                action: wire.action,
                expected: "at least 1",
                actual,
            })?;
            return Ok(match wire.action {
                Action::Mlock => Self::MultiLock { names },
                _ => Self::MultiUnlock { names },
            });
        }

        let [name]: [String; 1] = wire.params.try_into().map_err(|_| ProtocolError::Arity {
            action: wire.action,
            expected: "exactly 1",
            actual,
        })?;

        Ok(match wire.action {
            Action::Connect => Self::Connect { name },
            Action::Close => Self::Close { name },
            Action::Lock => Self::Lock { name },
            _ => Self::Unlock { name },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connect_encodes_single_param() {
        let req = Request::Connect { name: "alice".into() };
        assert_eq!(req.encode().unwrap(), r#"{"action":"connect","params":["alice"]}"#);
    }

    #[test]
    fn mlock_encodes_all_names() {
        let req = Request::MultiLock { names: LockNames::parse("a, b;c   d").unwrap() };
        assert_eq!(req.encode().unwrap(), r#"{"action":"mlock","params":["a","b","c","d"]}"#);
    }

    #[test]
    fn decode_each_action() {
        let cases = [
            (r#"{"action":"connect","params":["u"]}"#, Action::Connect),
            (r#"{"action":"close","params":["u"]}"#, Action::Close),
            (r#"{"action":"lock","params":["l"]}"#, Action::Lock),
            (r#"{"action":"unlock","params":["l"]}"#, Action::Unlock),
            (r#"{"action":"mlock","params":["a","b"]}"#, Action::Mlock),
            (r#"{"action":"munlock","params":["a"]}"#, Action::Munlock),
        ];
        for (raw, action) in cases {
            assert_eq!(Request::decode(raw).unwrap().action(), action, "{raw}");
        }
    }

    #[test]
    fn decode_rejects_unknown_action() {
        let result = Request::decode(r#"{"action":"steal","params":["l"]}"#);
        assert!(matches!(result, Err(ProtocolError::Json(_))));
    }

    #[test]
    fn decode_rejects_wrong_arity() {
        let two = Request::decode(r#"{"action":"lock","params":["a","b"]}"#);
        assert!(matches!(two, Err(ProtocolError::Arity { actual: 2, .. })));

        let none = Request::decode(r#"{"action":"mlock","params":[]}"#);
        assert!(matches!(none, Err(ProtocolError::Arity { actual: 0, .. })));
    }

    #[test]
    fn params_follow_variant() {
        let req = Request::Unlock { name: "x".into() };
        assert_eq!(req.params(), ["x"]);
        assert!(!req.action().is_batch());
    }
}
