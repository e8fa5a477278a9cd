//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from the system clock and
//! the async timer, so that audit timestamps and reconnect delays can be
//! driven by a virtual clock in tests.
//!
//! # Invariants
//!
//! - Isolation: implementations must not share global state
//! - `sleep` is only awaited by driver code, never by state machines

use std::time::{Duration, SystemTime};

/// Abstract environment providing wall-clock time and async sleep.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    ///
    /// Used to stamp locally generated audit events. Unlike a monotonic
    /// clock this may jump; callers only display it.
    fn now(&self) -> SystemTime;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (not protocol logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
