//! Deterministic simulation harness for the distlock client.
//!
//! In-memory implementations of the Environment and Transport traits, a lock
//! service that answers the way the real one does, and a scripted driver, so
//! the whole runtime can be exercised without sockets or wall-clock time.
//!
//! ```text
//! ScriptedDriver ──► Runtime ──► SimTransport ──► SimServer
//!      ▲                │             │
//!      └── RecordingSink┘        fault injection
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod model;
pub mod scripted_driver;
pub mod sim_env;
pub mod sim_server;
pub mod sim_transport;

pub use model::{ModelClient, NameInput, NamesInput, Operation, OperationResult, Rejection};
pub use scripted_driver::{RecordingSink, ScriptedDriver, SinkEntry, Step};
pub use sim_env::SimEnv;
pub use sim_server::{LinkId, SharedSimServer, SimServer, create_shared_server, lock_server};
pub use sim_transport::{SimLink, SimTransport};
