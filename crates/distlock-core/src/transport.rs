//! Transport abstraction for the lock channel.
//!
//! A channel runs over one of several transport kinds: a native
//! bidirectional socket, or a request/response polling fallback when the
//! socket cannot be negotiated. Production implementations live behind the
//! client's `transport` feature; tests use in-memory links.

use std::{fmt, str::FromStr};

use async_trait::async_trait;

use crate::error::TransportError;

/// Concrete message-delivery mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Persistent WebSocket.
    WebSocket,
    /// HTTP long-polling: a held GET for inbound frames, POST for outbound.
    LongPolling,
}

impl TransportKind {
    /// Name used on the wire and in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::LongPolling => "long-polling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "long-polling" | "long_polling" | "longpolling" => Ok(Self::LongPolling),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// Which transports a connection may use and which one it ended up on.
///
/// `negotiated` is set when the connection first opens and stays fixed for
/// the connection's lifetime, including across resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportDescriptor {
    /// Transport attempted first.
    pub primary: TransportKind,
    /// Transport attempted when the primary cannot be established.
    pub fallback: TransportKind,
    /// Transport actually in use, once known.
    pub negotiated: Option<TransportKind>,
}

/// What a link reports when polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One inbound text frame.
    Frame(String),
    /// The peer closed the link deliberately.
    Closed,
    /// The link broke; the peer may still be reachable.
    Lost(String),
}

/// Factory for links of each transport kind.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Link type produced by this transport.
    type Link: Link;

    /// Establish a link using `kind`.
    ///
    /// Fails with `Unavailable` when `kind` cannot be negotiated with the
    /// endpoint; the caller decides whether to fall back.
    async fn connect(&self, kind: TransportKind) -> Result<Self::Link, TransportError>;
}

/// An established duplex link carrying text frames.
#[async_trait]
pub trait Link: Send + 'static {
    /// Write one frame. Frames are delivered in call order.
    async fn send(&mut self, raw: String) -> Result<(), TransportError>;

    /// Wait for the next inbound event.
    ///
    /// Must be cancel safe: dropping the future before it completes must not
    /// lose a frame. Returns `None` once the link has nothing more to report.
    async fn recv(&mut self) -> Option<LinkEvent>;

    /// Close the link. Idempotent.
    async fn close(&mut self);
}
