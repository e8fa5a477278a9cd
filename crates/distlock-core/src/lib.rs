//! distlock transport session
//!
//! Pure state machine for the single reconnectable channel between the
//! client and the lock service, decoupled from I/O.
//!
//! # Architecture
//!
//! The [`connection::Connection`] state machine never touches the network.
//! Each transition returns declarative [`connection::ConnectionAction`]s
//! (connect with a transport, transmit a frame, disconnect, emit a lifecycle
//! event) and a runtime interprets them against a [`transport::Transport`].
//! The same state machine therefore runs unchanged against real sockets and
//! against the in-memory transports used in tests.
//!
//! # Components
//!
//! - [`connection`]: channel lifecycle (negotiation, fallback, reconnect)
//! - [`transport`]: transport kinds, descriptor, and async link traits
//! - [`mod@env`]: environment abstraction (wall clock, sleep)
//! - [`error`]: connection and transport error types

pub mod connection;
pub mod env;
pub mod error;
pub mod transport;

pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionEvent, ConnectionState, LogLevel,
};
pub use env::Environment;
pub use error::{ConnectionError, TransportError};
pub use transport::{Link, LinkEvent, Transport, TransportDescriptor, TransportKind};
