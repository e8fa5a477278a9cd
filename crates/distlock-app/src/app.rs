//! Application state.
//!
//! [`App`] holds what the UI shows beside the message log: the status
//! prompt and whether lock input is enabled. It also enforces toggle
//! semantics for identity, which the protocol itself leaves to the caller.

use distlock_client::{ClientEvent, Session};
use distlock_core::ConnectionState;

use crate::commands::Command;

/// What the runtime should do with a parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Hand this event to the lock client.
    Client(ClientEvent),
    /// Show this reason and do nothing else.
    Reject(String),
    /// Shut down.
    Quit,
    /// Nothing to do.
    Ignore,
}

/// UI state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    status: String,
    input_enabled: bool,
}

impl Default for App {
    fn default() -> Self {
        Self { status: "Connecting...".to_string(), input_enabled: true }
    }
}

impl App {
    /// Create the initial UI state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status prompt, e.g. `Choose name:` or `alice: `.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether lock input is enabled.
    ///
    /// Advisory: a lock action disables input until a notification arrives,
    /// but commands are still accepted while disabled.
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Map a command to an action given the current session.
    pub fn on_command(&self, command: Command, session: &Session) -> AppAction {
        match command {
            Command::Connect { name } => {
                if let Some(current) = session.identity().name() {
                    return AppAction::Reject(format!(
                        "Already connected as {current}, /close first"
                    ));
                }
                AppAction::Client(ClientEvent::Identify(name))
            },
            Command::Close => {
                if !session.is_authenticated() {
                    return AppAction::Reject("Not connected, /connect <name> first".to_string());
                }
                AppAction::Client(ClientEvent::Deidentify)
            },
            Command::Lock { name } => AppAction::Client(ClientEvent::RequestLock(name)),
            Command::Unlock { name } => AppAction::Client(ClientEvent::ReleaseLock(name)),
            Command::MultiLock { names } => AppAction::Client(ClientEvent::RequestLocks(names)),
            Command::MultiUnlock { names } => AppAction::Client(ClientEvent::ReleaseLocks(names)),
            Command::Quit => AppAction::Quit,
            Command::Empty => AppAction::Ignore,
            Command::Unknown { input } => AppAction::Reject(format!("Unknown command: {input}")),
            Command::InvalidArgs { error, .. } => AppAction::Reject(error),
        }
    }

    /// A lock action was issued; wait for its outcome.
    pub fn lock_issued(&mut self) {
        self.input_enabled = false;
    }

    /// An outcome arrived.
    pub fn enable_input(&mut self) {
        self.input_enabled = true;
    }

    /// Recompute the status prompt from the session.
    pub fn sync(&mut self, session: &Session) {
        self.status = match (session.connection_state(), session.identity().name()) {
            (ConnectionState::Open, Some(name)) => format!("{name}: "),
            (ConnectionState::Open, None) => "Choose name:".to_string(),
            (ConnectionState::Connecting, _) => "Connecting...".to_string(),
            (ConnectionState::Reconnecting, _) => "Reconnecting...".to_string(),
            (ConnectionState::Closed | ConnectionState::Failed, _) => "Disconnected".to_string(),
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        future::Future,
        time::{Duration, SystemTime, UNIX_EPOCH},
    };

    use distlock_client::{ClientConfig, LockClient};
    use distlock_core::{ConnectionEvent, Environment, TransportKind};

    use super::*;
    use crate::commands::parse;

    #[derive(Debug, Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn now(&self) -> SystemTime {
            UNIX_EPOCH
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }
    }

    fn open_client() -> LockClient<FixedEnv> {
        let mut client = LockClient::new(FixedEnv, ClientConfig::default());
        client.on_channel_event(ConnectionEvent::Opened { transport: TransportKind::WebSocket });
        client
    }

    #[test]
    fn prompt_follows_identity() {
        let mut app = App::new();
        let mut client = open_client();

        app.sync(client.session());
        assert_eq!(app.status(), "Choose name:");

        client.identify("alice").unwrap();
        app.sync(client.session());
        assert_eq!(app.status(), "alice: ");

        client.on_channel_event(ConnectionEvent::Closed);
        app.sync(client.session());
        assert_eq!(app.status(), "Disconnected");
    }

    #[test]
    fn connect_while_authenticated_is_rejected() {
        let app = App::new();
        let mut client = open_client();
        client.identify("alice").unwrap();

        let action = app.on_command(parse("/connect bob"), client.session());
        assert!(matches!(action, AppAction::Reject(reason) if reason.contains("alice")));
    }

    #[test]
    fn close_while_anonymous_is_rejected() {
        let app = App::new();
        let client = open_client();

        assert!(matches!(app.on_command(Command::Close, client.session()), AppAction::Reject(_)));
    }

    #[test]
    fn toggle_round_trip() {
        let app = App::new();
        let client = open_client();

        assert_eq!(
            app.on_command(parse("/connect alice"), client.session()),
            AppAction::Client(ClientEvent::Identify("alice".into()))
        );
    }

    #[test]
    fn input_affordance() {
        let mut app = App::new();
        assert!(app.input_enabled());
        app.lock_issued();
        assert!(!app.input_enabled());
        app.enable_input();
        assert!(app.input_enabled());
    }

    #[test]
    fn lock_commands_map_to_client_events() {
        let app = App::new();
        let client = open_client();
        let session = client.session();

        assert_eq!(
            app.on_command(parse("/mlock a,b"), session),
            AppAction::Client(ClientEvent::RequestLocks("a,b".into()))
        );
        assert_eq!(app.on_command(parse("/quit"), session), AppAction::Quit);
        assert_eq!(app.on_command(parse(""), session), AppAction::Ignore);
    }
}
