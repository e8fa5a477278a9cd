//! distlock lock client
//!
//! Action-based state machine for the client side of the lock protocol.
//!
//! # Architecture
//!
//! [`LockClient`] consumes [`ClientEvent`]s (user intents and connection
//! lifecycle events) and returns [`ClientAction`]s. It never performs I/O.
//! The runtime sends `Send` payloads through the connection, routes
//! `Deliver`, `Audit` and `Inform` to the notification sink, and re-enables
//! input on `EnableInput`.
//!
//! ```text
//!            ClientEvent                        ClientAction
//! user ─────────────────> ┌────────────┐ ─────────────────────> runtime
//! connection ───────────> │ LockClient │   Send / Deliver / Audit
//!                         │  Session   │   Inform / EnableInput
//!                         └────────────┘
//! ```
//!
//! # Components
//!
//! - [`client`]: the lock client state machine and its actions
//! - [`session`]: identity, authentication and mirrored channel state
//! - [`error`]: client error type
//! - `transport` (feature `transport`): WebSocket and long-polling links

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod error;
pub mod session;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{
    AuditEvent, ClientAction, ClientConfig, ClientEvent, Info, LockClient, UnauthenticatedPolicy,
};
pub use error::ClientError;
pub use session::{AuthState, Identity, Session};
