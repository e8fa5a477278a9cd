//! Connection state machine for the lock channel.
//!
//! This module implements the transport session: negotiating a transport,
//! falling back when the primary is unavailable, riding out transient loss,
//! and shutting down.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods never perform I/O
//! - Methods return `Vec<ConnectionAction>` (or a `Result` of one)
//! - Driver code executes actions (connect, transmit, disconnect, emit)
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  opened   ┌──────┐  connection_lost  ┌──────────────┐
//! │ Connecting │──────────>│ Open │──────────────────>│ Reconnecting │
//! └────────────┘           └──────┘<──────────────────└──────────────┘
//!       │                     │            opened             │
//!       │ no transport left   │ close / remote_closed         │ attempts exhausted
//!       ↓                     ↓                               ↓
//!  ┌────────┐            ┌────────┐                      ┌────────┐
//!  │ Failed │            │ Closed │                      │ Failed │
//!  └────────┘            └────────┘                      └────────┘
//! ```
//!
//! `Closed` and `Failed` are terminal: no further frame is accepted for
//! sending and every transition becomes a no-op or an error.
//!
//! # Delivery
//!
//! Frames accepted by [`Connection::send`] while `Open` are transmitted in
//! call order. Frames in flight when the link is lost may never arrive; the
//! channel is at-most-once.

use std::{fmt, str::FromStr, time::Duration};

use crate::{
    error::ConnectionError,
    transport::{TransportDescriptor, TransportKind},
};

/// Lifecycle notifications surfaced to the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Channel opened (or resumed) on `transport`.
    Opened {
        /// Negotiated transport.
        transport: TransportKind,
    },
    /// One inbound frame, in delivery order.
    Message(String),
    /// Channel lost; a resume is being attempted.
    Reconnecting,
    /// Channel closed, locally or by the service.
    Closed,
    /// Channel fault.
    Error {
        /// Description of the fault.
        detail: String,
        /// Whether the channel is now `Failed`.
        terminal: bool,
    },
    /// Advisory: a transport could not be negotiated and another is being
    /// tried.
    TransportFailure {
        /// Transport that failed.
        transport: TransportKind,
        /// Explanation from the transport.
        message: String,
    },
}

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Establish a link with `transport` after waiting `delay`.
    Connect {
        /// Transport to use.
        transport: TransportKind,
        /// Wait before connecting (zero on first attempt).
        delay: Duration,
    },
    /// Write this frame to the current link.
    Transmit(String),
    /// Tear down the current link.
    Disconnect,
    /// Report this event to the layer above.
    Emit(ConnectionEvent),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Negotiating a transport.
    Connecting,
    /// Link established, frames flow.
    Open,
    /// Link lost, resume in progress.
    Reconnecting,
    /// Closed on request (terminal).
    Closed,
    /// Unrecoverable failure (terminal).
    Failed,
}

impl ConnectionState {
    /// Whether the state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Verbosity requested for the channel's diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including every frame.
    #[default]
    Trace,
    /// Transitions and frames.
    Debug,
    /// Lifecycle only.
    Info,
    /// Degradations.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing` filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Transport tried first.
    pub primary: TransportKind,
    /// Transport tried when the primary cannot be established.
    pub fallback: TransportKind,
    /// Content type announced to the service, in the handshake and on
    /// every posted frame.
    pub content_type: String,
    /// Diagnostic verbosity. Frontends use it as their default log filter.
    pub log_level: LogLevel,
    /// Resume attempts after a transient loss before giving up.
    pub max_reconnect_attempts: u32,
    /// Wait between resume attempts.
    pub reconnect_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            primary: TransportKind::WebSocket,
            fallback: TransportKind::LongPolling,
            content_type: "application/json".to_string(),
            log_level: LogLevel::Trace,
            max_reconnect_attempts: 5,
            reconnect_interval: Duration::from_secs(1),
        }
    }
}

/// Connection state machine
///
/// Owns the lifecycle of one logical channel. Pure: no I/O, no clock.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Current state
    state: ConnectionState,
    /// Configuration
    config: ConnectionConfig,
    /// Primary/fallback/negotiated transports
    descriptor: TransportDescriptor,
    /// Whether the fallback has already been attempted
    fallback_attempted: bool,
    /// Resume attempts made since the link was lost
    reconnect_attempts: u32,
}

impl Connection {
    /// Create a connection in `Connecting` and return the first action
    /// (connect with the primary transport).
    pub fn open(config: ConnectionConfig) -> (Self, Vec<ConnectionAction>) {
        let descriptor = TransportDescriptor {
            primary: config.primary,
            fallback: config.fallback,
            negotiated: None,
        };
        let connection = Self {
            state: ConnectionState::Connecting,
            config,
            descriptor,
            fallback_attempted: false,
            reconnect_attempts: 0,
        };

        tracing::debug!(primary = %descriptor.primary, fallback = %descriptor.fallback, "opening channel");

        let actions = vec![ConnectionAction::Connect {
            transport: descriptor.primary,
            delay: Duration::ZERO,
        }];
        (connection, actions)
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the transport descriptor
    pub fn descriptor(&self) -> TransportDescriptor {
        self.descriptor
    }

    /// Get the configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Resume attempts made since the last loss (zero while open).
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// A link was established with `transport`.
    ///
    /// From `Connecting` this records the negotiated transport; from
    /// `Reconnecting` it resumes on the transport already negotiated.
    ///
    /// # Errors
    /// Returns `InvalidState` from `Open` or a terminal state.
    pub fn opened(
        &mut self,
        transport: TransportKind,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Connecting => {
                self.descriptor.negotiated = Some(transport);
            },
            ConnectionState::Reconnecting => {},
            state => {
                return Err(ConnectionError::InvalidState {
                    state,
                    operation: "opened".to_string(),
                });
            },
        }

        self.state = ConnectionState::Open;
        self.reconnect_attempts = 0;

        let transport = self.descriptor.negotiated.unwrap_or(transport);
        tracing::info!(%transport, "channel open");

        Ok(vec![ConnectionAction::Emit(ConnectionEvent::Opened { transport })])
    }

    /// Establishing `transport` failed during negotiation.
    ///
    /// If the primary failed and a distinct fallback has not been tried, this
    /// emits an advisory `TransportFailure` and asks for the fallback.
    /// Otherwise no transport is left and the connection fails.
    ///
    /// # Errors
    /// Returns `InvalidState` outside `Connecting`.
    pub fn negotiation_failed(
        &mut self,
        transport: TransportKind,
        reason: &str,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "negotiation_failed".to_string(),
            });
        }

        let can_fall_back = transport == self.descriptor.primary
            && self.descriptor.fallback != self.descriptor.primary
            && !self.fallback_attempted;

        if can_fall_back {
            self.fallback_attempted = true;
            let fallback = self.descriptor.fallback;
            tracing::warn!(%transport, %fallback, reason, "transport unavailable, falling back");

            return Ok(vec![
                ConnectionAction::Emit(ConnectionEvent::TransportFailure {
                    transport,
                    message: reason.to_string(),
                }),
                ConnectionAction::Connect { transport: fallback, delay: Duration::ZERO },
            ]);
        }

        Ok(self.fail(format!("no usable transport ({transport}: {reason})")))
    }

    /// Accept a frame for sending.
    ///
    /// # Errors
    /// Returns `NotOpen` unless the channel is `Open`.
    pub fn send(&mut self, raw: String) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Open {
            return Err(ConnectionError::NotOpen { state: self.state });
        }

        tracing::trace!(frame = %raw, "transmit");
        Ok(vec![ConnectionAction::Transmit(raw)])
    }

    /// An inbound frame arrived.
    ///
    /// # Errors
    /// Returns `UnexpectedFrame` unless the channel is `Open`.
    pub fn frame_received(&mut self, raw: String) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Open {
            return Err(ConnectionError::UnexpectedFrame { state: self.state });
        }

        tracing::trace!(frame = %raw, "received");
        Ok(vec![ConnectionAction::Emit(ConnectionEvent::Message(raw))])
    }

    /// The open link broke.
    ///
    /// Moves to `Reconnecting` and asks for a resume on the negotiated
    /// transport, or fails straight away when resumes are disabled.
    ///
    /// # Errors
    /// Returns `InvalidState` outside `Open`.
    pub fn connection_lost(&mut self, detail: &str) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Open {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "connection_lost".to_string(),
            });
        }

        if self.config.max_reconnect_attempts == 0 {
            return Ok(self.fail(format!("connection lost: {detail}")));
        }

        tracing::warn!(detail, "connection lost, reconnecting");
        self.state = ConnectionState::Reconnecting;
        self.reconnect_attempts = 1;

        Ok(vec![ConnectionAction::Emit(ConnectionEvent::Reconnecting), self.resume_action()])
    }

    /// A resume attempt failed.
    ///
    /// Retries until `max_reconnect_attempts` is reached, then fails.
    ///
    /// # Errors
    /// Returns `InvalidState` outside `Reconnecting`.
    pub fn reconnect_failed(&mut self, detail: &str) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Reconnecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "reconnect_failed".to_string(),
            });
        }

        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            return Ok(self.fail(format!(
                "gave up after {} reconnect attempts: {detail}",
                self.reconnect_attempts
            )));
        }

        self.reconnect_attempts += 1;
        tracing::debug!(attempt = self.reconnect_attempts, detail, "reconnect attempt failed");

        Ok(vec![self.resume_action()])
    }

    /// A non-fatal channel fault after negotiation.
    ///
    /// State is unchanged. Ignored once terminal.
    pub fn fault(&mut self, detail: &str) -> Vec<ConnectionAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        tracing::warn!(detail, "channel fault");
        vec![ConnectionAction::Emit(ConnectionEvent::Error {
            detail: detail.to_string(),
            terminal: false,
        })]
    }

    /// Close the channel on request. Idempotent.
    pub fn close(&mut self) -> Vec<ConnectionAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        tracing::info!("closing channel");
        self.state = ConnectionState::Closed;
        vec![ConnectionAction::Disconnect, ConnectionAction::Emit(ConnectionEvent::Closed)]
    }

    /// The service closed the channel. Idempotent.
    pub fn remote_closed(&mut self) -> Vec<ConnectionAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        tracing::info!("channel closed by service");
        self.state = ConnectionState::Closed;
        vec![ConnectionAction::Emit(ConnectionEvent::Closed)]
    }

    fn resume_action(&self) -> ConnectionAction {
        let transport = self.descriptor.negotiated.unwrap_or(self.descriptor.primary);
        ConnectionAction::Connect { transport, delay: self.config.reconnect_interval }
    }

    fn fail(&mut self, detail: String) -> Vec<ConnectionAction> {
        tracing::error!(%detail, "channel failed");
        self.state = ConnectionState::Failed;
        vec![
            ConnectionAction::Disconnect,
            ConnectionAction::Emit(ConnectionEvent::Error { detail, terminal: true }),
        ]
    }
}
