//! Reference model of the lock client for model-based testing.
//!
//! [`ModelClient`] restates the client's contract in the simplest possible
//! form (plain fields, hand-written JSON) so that generated [`Operation`]
//! sequences can be replayed against both it and the real
//! [`distlock_client::LockClient`] and the results compared.

use arbitrary::Arbitrary;
use distlock_client::UnauthenticatedPolicy;
use distlock_core::ConnectionState;

/// Single-name user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum NameInput {
    /// `alice`
    Alice,
    /// `bob`
    Bob,
    /// `printer`
    Printer,
    /// Whitespace only.
    Blank,
    /// `printer` with surrounding whitespace.
    Padded,
}

impl NameInput {
    /// Raw text typed by the user.
    pub fn raw(self) -> &'static str {
        match self {
            Self::Alice => "alice",
            Self::Bob => "bob",
            Self::Printer => "printer",
            Self::Blank => " \t ",
            Self::Padded => "  printer  ",
        }
    }

    /// The name after trimming, if any.
    fn trimmed(self) -> Option<&'static str> {
        match self {
            Self::Alice => Some("alice"),
            Self::Bob => Some("bob"),
            Self::Printer | Self::Padded => Some("printer"),
            Self::Blank => None,
        }
    }
}

/// Free-text list of lock names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum NamesInput {
    /// One name.
    Single,
    /// Four names with mixed separators.
    Mixed,
    /// Separators and nothing else.
    SeparatorsOnly,
    /// Empty string.
    Empty,
}

impl NamesInput {
    /// Raw text typed by the user.
    pub fn raw(self) -> &'static str {
        match self {
            Self::Single => "a",
            Self::Mixed => "a, b;c   d",
            Self::SeparatorsOnly => " ,; ;, ",
            Self::Empty => "",
        }
    }

    /// The names the text splits into.
    fn tokens(self) -> &'static [&'static str] {
        match self {
            Self::Single => &["a"],
            Self::Mixed => &["a", "b", "c", "d"],
            Self::SeparatorsOnly | Self::Empty => &[],
        }
    }
}

/// Operations applied to both the model and the real client.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// `identify`
    Identify(NameInput),
    /// `deidentify`
    Deidentify,
    /// `request_lock`
    RequestLock(NameInput),
    /// `release_lock`
    ReleaseLock(NameInput),
    /// `request_locks`
    RequestLocks(NamesInput),
    /// `release_locks`
    ReleaseLocks(NamesInput),
    /// Channel opened.
    ChannelOpened,
    /// Channel lost, resuming.
    ChannelReconnecting,
    /// Channel closed.
    ChannelClosed,
    /// Channel fault.
    ChannelError {
        /// Whether the channel failed for good.
        terminal: bool,
    },
    /// Inbound frame.
    Notification {
        /// Whether the frame is well formed.
        valid: bool,
    },
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Unusable input.
    InvalidInput,
    /// Channel not open.
    ChannelUnavailable,
    /// Refused by the unauthenticated policy.
    NotAuthenticated,
}

/// Observable result of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// These frames were sent, in order.
    Sent(Vec<String>),
    /// Accepted, nothing sent.
    NothingSent,
    /// Refused before anything was sent.
    Rejected(Rejection),
}

/// Reference model of the lock client.
#[derive(Debug, Clone)]
pub struct ModelClient {
    policy: UnauthenticatedPolicy,
    state: ConnectionState,
    identity: Option<String>,
    resume_as: Option<String>,
}

fn frame(action: &str, params: &[&str]) -> String {
    let params: Vec<String> = params.iter().map(|p| format!("\"{p}\"")).collect();
    format!("{{\"action\":\"{action}\",\"params\":[{}]}}", params.join(","))
}

impl ModelClient {
    /// Fresh model: anonymous, channel connecting.
    pub fn new(policy: UnauthenticatedPolicy) -> Self {
        Self { policy, state: ConnectionState::Connecting, identity: None, resume_as: None }
    }

    /// Current identity.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Mirrored channel state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Identify(name) => {
                let Some(name) = name.trimmed() else {
                    return OperationResult::Rejected(Rejection::InvalidInput);
                };
                if self.state != ConnectionState::Open {
                    return OperationResult::Rejected(Rejection::ChannelUnavailable);
                }
                self.identity = Some(name.to_string());
                OperationResult::Sent(vec![frame("connect", &[name])])
            },
            Operation::Deidentify => {
                let Some(name) = self.identity.take() else {
                    self.resume_as = None;
                    return OperationResult::NothingSent;
                };
                if self.state == ConnectionState::Open {
                    OperationResult::Sent(vec![frame("close", &[&name])])
                } else {
                    OperationResult::NothingSent
                }
            },
            Operation::RequestLock(name) => self.lock_op("lock", name.trimmed().map(|n| vec![n])),
            Operation::ReleaseLock(name) => {
                self.lock_op("unlock", name.trimmed().map(|n| vec![n]))
            },
            Operation::RequestLocks(names) => self.lock_op("mlock", non_empty(names.tokens())),
            Operation::ReleaseLocks(names) => self.lock_op("munlock", non_empty(names.tokens())),
            Operation::ChannelOpened => {
                self.state = ConnectionState::Open;
                match self.resume_as.take() {
                    Some(name) => {
                        let sent = frame("connect", &[&name]);
                        self.identity = Some(name);
                        OperationResult::Sent(vec![sent])
                    },
                    None => OperationResult::NothingSent,
                }
            },
            Operation::ChannelReconnecting => {
                self.state = ConnectionState::Reconnecting;
                if let Some(name) = self.identity.take() {
                    self.resume_as = Some(name);
                }
                OperationResult::NothingSent
            },
            Operation::ChannelClosed => {
                self.state = ConnectionState::Closed;
                self.resume_as = None;
                self.identity = None;
                OperationResult::NothingSent
            },
            Operation::ChannelError { terminal } => {
                if terminal {
                    self.state = ConnectionState::Failed;
                    self.identity = None;
                    self.resume_as = None;
                }
                OperationResult::NothingSent
            },
            Operation::Notification { .. } => OperationResult::NothingSent,
        }
    }

    fn lock_op(&self, action: &str, params: Option<Vec<&str>>) -> OperationResult {
        let Some(params) = params else {
            return OperationResult::Rejected(Rejection::InvalidInput);
        };
        if self.policy == UnauthenticatedPolicy::Reject && self.identity.is_none() {
            return OperationResult::Rejected(Rejection::NotAuthenticated);
        }
        if self.state != ConnectionState::Open {
            return OperationResult::Rejected(Rejection::ChannelUnavailable);
        }
        OperationResult::Sent(vec![frame(action, &params)])
    }
}

fn non_empty(tokens: &'static [&'static str]) -> Option<Vec<&'static str>> {
    if tokens.is_empty() { None } else { Some(tokens.to_vec()) }
}
