//! Client-visible session state.

use std::fmt;

use distlock_core::ConnectionState;

/// Who the client claims to be.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// No name chosen yet, or logged out.
    #[default]
    Anonymous,
    /// Display name sent with `connect`.
    Named(String),
}

impl Identity {
    /// The display name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Whether the service has been told who we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No `connect` sent, or it was undone by `close` or a disconnect.
    #[default]
    Unauthenticated,
    /// A `connect` was sent and not undone.
    Authenticated,
}

/// The single session owned by a [`crate::LockClient`].
///
/// `auth_state` is `Authenticated` exactly when `identity` is `Named`; both
/// change together through [`Session::log_in`] and [`Session::log_out`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Identity,
    auth_state: AuthState,
    connection_state: ConnectionState,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            identity: Identity::Anonymous,
            auth_state: AuthState::Unauthenticated,
            connection_state: ConnectionState::Connecting,
        }
    }
}

impl Session {
    /// Current identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Current authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    /// Last channel state reported by the transport session.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Whether a `connect` is outstanding.
    pub fn is_authenticated(&self) -> bool {
        self.auth_state == AuthState::Authenticated
    }

    pub(crate) fn log_in(&mut self, name: String) {
        self.identity = Identity::Named(name);
        self.auth_state = AuthState::Authenticated;
    }

    pub(crate) fn log_out(&mut self) {
        self.identity = Identity::Anonymous;
        self.auth_state = AuthState::Unauthenticated;
    }

    pub(crate) fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_anonymous_and_connecting() {
        let session = Session::default();
        assert_eq!(session.identity(), &Identity::Anonymous);
        assert_eq!(session.auth_state(), AuthState::Unauthenticated);
        assert_eq!(session.connection_state(), ConnectionState::Connecting);
    }

    #[test]
    fn log_in_and_out_move_together() {
        let mut session = Session::default();
        session.log_in("alice".into());
        assert!(session.is_authenticated());
        assert_eq!(session.identity().name(), Some("alice"));

        session.log_out();
        assert!(!session.is_authenticated());
        assert_eq!(session.identity().to_string(), "anonymous");
    }
}
