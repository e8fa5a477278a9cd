//! Lock client state machine.
//!
//! Validates user intents, keeps the [`Session`] in step with the channel, and
//! turns service frames into notifications. Like the connection below it,
//! the client performs no I/O: every operation returns [`ClientAction`]s for
//! the runtime to execute.
//!
//! # Request gating
//!
//! A request is built only after three checks pass, in this order:
//!
//! 1. the user input is usable (`InvalidInput`)
//! 2. the unauthenticated policy allows it (`NotAuthenticated`)
//! 3. the channel is open (`ChannelUnavailable`)
//!
//! A failed check leaves the session untouched and sends nothing.

use std::{fmt, time::SystemTime};

use distlock_core::{ConnectionEvent, ConnectionState, Environment, TransportKind};
use distlock_proto::{LockNames, Notification, Request};

use crate::{
    error::ClientError,
    session::{Identity, Session},
};

/// What to do with lock requests issued before `identify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnauthenticatedPolicy {
    /// Send them; the service answers with a `FAIL` notification.
    #[default]
    Permit,
    /// Refuse them locally with [`ClientError::NotAuthenticated`].
    Reject,
}

/// Client configuration
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Handling of lock requests without an identity.
    pub unauthenticated: UnauthenticatedPolicy,
}

/// Locally generated record of a user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// When the action was issued.
    pub at: SystemTime,
    /// What was attempted, e.g. `TRY LOCK printer`.
    pub description: String,
}

/// Informational message about the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Info {
    /// The channel opened on `transport`.
    Connected {
        /// Negotiated transport.
        transport: TransportKind,
    },
    /// A transport could not be negotiated; another is being tried.
    TransportFailure {
        /// Transport that failed.
        transport: TransportKind,
        /// Explanation from the transport.
        message: String,
    },
    /// The channel was lost and is being resumed.
    Reconnecting,
    /// The service cannot be reached.
    ServiceUnavailable {
        /// Underlying fault.
        detail: String,
    },
    /// The channel closed.
    Closed,
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { transport } => write!(f, "Connected using {transport}"),
            Self::TransportFailure { transport, message } => {
                write!(f, "{transport} not supported: {message}")
            },
            Self::Reconnecting => f.write_str("Reconnecting"),
            Self::ServiceUnavailable { detail } => write!(
                f,
                "Sorry, but there's some problem with your socket or the server is down ({detail})"
            ),
            Self::Closed => f.write_str("Connection closed"),
        }
    }
}

/// Inputs to the lock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Identify as this display name.
    Identify(String),
    /// Drop the current identity.
    Deidentify,
    /// Acquire one lock.
    RequestLock(String),
    /// Release one lock.
    ReleaseLock(String),
    /// Acquire every lock named in free text.
    RequestLocks(String),
    /// Release every lock named in free text.
    ReleaseLocks(String),
    /// A request from an earlier `Send` was never written to the link.
    SendFailed(Request),
    /// Lifecycle event from the connection.
    Channel(ConnectionEvent),
}

/// Actions returned by the lock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Send this request over the channel.
    Send {
        /// The request, for inspection.
        request: Request,
        /// Encoded JSON frame.
        payload: String,
    },
    /// Hand a decoded notification to the sink.
    Deliver(Notification),
    /// Record a user action.
    Audit(AuditEvent),
    /// Show an informational message.
    Inform(Info),
    /// The previous lock action has an outcome; input may be re-enabled.
    EnableInput,
}

/// Lock client state machine
///
/// Owns the [`Session`]. Generic over the environment so audit timestamps are
/// deterministic under test.
#[derive(Debug)]
pub struct LockClient<E: Environment> {
    env: E,
    config: ClientConfig,
    session: Session,
    /// Identity to restore once a lost channel resumes.
    resume_as: Option<String>,
}

impl<E: Environment> LockClient<E> {
    /// Create a client with an anonymous session awaiting the channel.
    pub fn new(env: E, config: ClientConfig) -> Self {
        Self { env, config, session: Session::default(), resume_as: None }
    }

    /// Current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dispatch one event.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Identify(name) => self.identify(&name),
            ClientEvent::Deidentify => Ok(self.deidentify()),
            ClientEvent::RequestLock(name) => self.request_lock(&name),
            ClientEvent::ReleaseLock(name) => self.release_lock(&name),
            ClientEvent::RequestLocks(names) => self.request_locks(&names),
            ClientEvent::ReleaseLocks(names) => self.release_locks(&names),
            ClientEvent::SendFailed(request) => Ok(self.send_failed(&request)),
            ClientEvent::Channel(event) => Ok(self.on_channel_event(event)),
        }
    }

    /// Open a service session under `name`.
    ///
    /// The protocol does not refuse a second `connect` while authenticated;
    /// toggling is the caller's concern.
    pub fn identify(&mut self, name: &str) -> Result<Vec<ClientAction>, ClientError> {
        let name = non_blank(name, "login")?;
        self.require_open()?;

        let request = Request::Connect { name: name.clone() };
        let payload = request.encode()?;

        tracing::info!(%name, "identify");
        self.session.log_in(name.clone());

        Ok(vec![self.audit(format!("Auth {name}")), ClientAction::Send { request, payload }])
    }

    /// Close the service session and forget the identity.
    ///
    /// The local reset always happens. The `close` request is only sent while
    /// the channel is open. While anonymous this only drops an identity
    /// waiting to be restored after a resume.
    pub fn deidentify(&mut self) -> Vec<ClientAction> {
        let Identity::Named(name) = self.session.identity().clone() else {
            self.resume_as = None;
            return Vec::new();
        };

        tracing::info!(%name, "deidentify");
        let mut actions = vec![self.audit(format!("Logout {name}"))];

        if self.session.connection_state() == ConnectionState::Open {
            let request = Request::Close { name };
            match request.encode() {
                Ok(payload) => actions.push(ClientAction::Send { request, payload }),
                Err(error) => tracing::warn!(%error, "failed to encode close request"),
            }
        } else {
            tracing::debug!(state = %self.session.connection_state(), "channel down, close not sent");
        }

        self.session.log_out();
        actions
    }

    /// Ask for one lock.
    pub fn request_lock(&mut self, name: &str) -> Result<Vec<ClientAction>, ClientError> {
        let name = non_blank(name, "lock")?;
        self.lock_request(format!("TRY LOCK {name}"), Request::Lock { name })
    }

    /// Release one lock.
    pub fn release_lock(&mut self, name: &str) -> Result<Vec<ClientAction>, ClientError> {
        let name = non_blank(name, "lock")?;
        self.lock_request(format!("TRY UNLOCK {name}"), Request::Unlock { name })
    }

    /// Ask for every lock named in `names`, split on whitespace, `,` and `;`.
    pub fn request_locks(&mut self, names: &str) -> Result<Vec<ClientAction>, ClientError> {
        let names = parse_names(names)?;
        self.lock_request(format!("TRY MLOCK {}", names.joined()), Request::MultiLock { names })
    }

    /// Release every lock named in `names`.
    pub fn release_locks(&mut self, names: &str) -> Result<Vec<ClientAction>, ClientError> {
        let names = parse_names(names)?;
        self.lock_request(format!("TRY MUNLOCK {}", names.joined()), Request::MultiUnlock {
            names,
        })
    }

    /// A request built by this client was never written to the link.
    ///
    /// An undelivered `connect` for the current identity rolls the session
    /// back to anonymous. An undelivered lock request will get no reply, so
    /// input is re-enabled.
    pub fn send_failed(&mut self, request: &Request) -> Vec<ClientAction> {
        match request {
            Request::Connect { name } => {
                if self.session.identity().name() == Some(name.as_str()) {
                    tracing::warn!(%name, "connect not delivered, dropping identity");
                    self.session.log_out();
                }
                Vec::new()
            },
            Request::Close { .. } => Vec::new(),
            Request::Lock { .. }
            | Request::Unlock { .. }
            | Request::MultiLock { .. }
            | Request::MultiUnlock { .. } => {
                tracing::debug!(action = %request.action(), "lock request not delivered");
                vec![ClientAction::EnableInput]
            },
        }
    }

    /// Decode a service frame.
    ///
    /// Malformed frames are logged and dropped without touching the session.
    pub fn on_notification(&mut self, raw: &str) -> Vec<ClientAction> {
        match Notification::decode(raw) {
            Ok(notification) => {
                tracing::debug!(status = %notification.status, message = %notification.message, "notification");
                vec![ClientAction::Deliver(notification), ClientAction::EnableInput]
            },
            Err(error) => {
                tracing::warn!(%error, frame = raw, "dropping undecodable frame");
                Vec::new()
            },
        }
    }

    /// Mirror a connection lifecycle event into the session.
    ///
    /// Service sessions do not outlive the link. A loss logs the client out,
    /// and the identity it held is sent again with `connect` once the channel
    /// resumes.
    pub fn on_channel_event(&mut self, event: ConnectionEvent) -> Vec<ClientAction> {
        match event {
            ConnectionEvent::Opened { transport } => {
                self.session.set_connection_state(ConnectionState::Open);
                let mut actions = vec![ClientAction::Inform(Info::Connected { transport })];

                if let Some(name) = self.resume_as.take() {
                    tracing::info!(%name, "restoring identity after resume");
                    match self.identify(&name) {
                        Ok(replayed) => actions.extend(replayed),
                        Err(error) => tracing::warn!(%error, %name, "identity not restored"),
                    }
                }
                actions
            },
            ConnectionEvent::Message(raw) => self.on_notification(&raw),
            ConnectionEvent::Reconnecting => {
                self.session.set_connection_state(ConnectionState::Reconnecting);
                if let Identity::Named(name) = self.session.identity().clone() {
                    tracing::info!(%name, "link lost, logged out until resume");
                    self.resume_as = Some(name);
                    self.session.log_out();
                }
                vec![ClientAction::Inform(Info::Reconnecting)]
            },
            ConnectionEvent::Closed => {
                self.resume_as = None;
                self.session.set_connection_state(ConnectionState::Closed);
                if self.session.is_authenticated() {
                    tracing::info!(identity = %self.session.identity(), "logged out by channel close");
                }
                self.session.log_out();
                vec![self.audit("closing".to_string()), ClientAction::Inform(Info::Closed)]
            },
            ConnectionEvent::Error { detail, terminal } => {
                if terminal {
                    self.resume_as = None;
                    self.session.set_connection_state(ConnectionState::Failed);
                    self.session.log_out();
                }
                vec![ClientAction::Inform(Info::ServiceUnavailable { detail })]
            },
            ConnectionEvent::TransportFailure { transport, message } => {
                vec![ClientAction::Inform(Info::TransportFailure { transport, message })]
            },
        }
    }

    fn lock_request(
        &mut self,
        description: String,
        request: Request,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if self.config.unauthenticated == UnauthenticatedPolicy::Reject
            && !self.session.is_authenticated()
        {
            return Err(ClientError::NotAuthenticated);
        }
        self.require_open()?;

        let payload = request.encode()?;
        tracing::debug!(action = %request.action(), params = ?request.params(), "lock request");

        Ok(vec![self.audit(description), ClientAction::Send { request, payload }])
    }

    fn require_open(&self) -> Result<(), ClientError> {
        match self.session.connection_state() {
            ConnectionState::Open => Ok(()),
            state => Err(ClientError::ChannelUnavailable { state }),
        }
    }

    fn audit(&self, description: String) -> ClientAction {
        ClientAction::Audit(AuditEvent { at: self.env.now(), description })
    }
}

fn non_blank(input: &str, what: &str) -> Result<String, ClientError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidInput { reason: format!("please enter a {what} name") });
    }
    Ok(trimmed.to_string())
}

fn parse_names(input: &str) -> Result<LockNames, ClientError> {
    LockNames::parse(input).map_err(|_| ClientError::InvalidInput {
        reason: format!("no lock names in {input:?}"),
    })
}
