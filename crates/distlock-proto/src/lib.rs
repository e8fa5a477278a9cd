//! Wire format for the distlock protocol.
//!
//! Every frame on the channel is a single JSON document. The client sends
//! [`Request`]s naming one of six actions with a list of string parameters,
//! and the service pushes [`Notification`]s carrying a timestamp, a status
//! code, and a human-readable message.
//!
//! ```text
//! client -> service   {"action": "lock", "params": ["printer"]}
//! service -> client   {"time": 1000, "status": "OK", "message": "Acquired"}
//! ```
//!
//! Requests are a closed set: an action outside the six variants cannot be
//! constructed, and the multi-name variants cannot be built with an empty
//! name list.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod names;
pub mod notification;
pub mod request;

pub use errors::{ProtocolError, Result};
pub use names::{LockNames, split_lock_names};
pub use notification::{Notification, Status};
pub use request::{Action, Request};
