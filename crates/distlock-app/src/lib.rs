//! Application layer for distlock
//!
//! Pure UI state and a generic runtime that wires the lock client and the
//! channel state machine to a frontend, so the same orchestration runs in
//! the terminal and in tests.
//!
//! # Components
//!
//! - [`App`]: UI state (status prompt, input affordance, toggle rules)
//! - [`commands`]: text command parsing
//! - [`NotificationSink`]: consumer of notifications, audits and info lines
//! - [`Driver`]: trait for platform-specific input and rendering
//! - [`Runtime`]: dispatch loop over link events and input lines

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod app;
pub mod commands;
mod driver;
mod error;
mod runtime;
mod sink;

pub use app::{App, AppAction};
pub use commands::Command;
pub use driver::Driver;
pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeConfig};
pub use sink::{NotificationSink, Tone, notification_text};
