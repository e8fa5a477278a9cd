//! Virtual-clock environment.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use distlock_core::Environment;

/// Default start of the virtual clock: 2024-01-01T00:00:00Z.
const DEFAULT_START_MILLIS: u64 = 1_704_067_200_000;

/// Environment whose clock only moves when told to.
///
/// `sleep` advances the clock by the requested duration and completes
/// immediately, so reconnect back-off costs no wall time. Clones share the
/// clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    now_millis: Arc<AtomicU64>,
    slept_millis: Arc<AtomicU64>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::starting_at(DEFAULT_START_MILLIS)
    }
}

impl SimEnv {
    /// Create an environment at the default start time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment whose clock reads `millis` after the epoch.
    pub fn starting_at(millis: u64) -> Self {
        Self {
            now_millis: Arc::new(AtomicU64::new(millis)),
            slept_millis: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.now_millis.fetch_add(duration_millis(duration), Ordering::SeqCst);
    }

    /// Current clock reading in epoch milliseconds.
    pub fn now_millis(&self) -> u64 {
        self.now_millis.load(Ordering::SeqCst)
    }

    /// Total time spent in `sleep`.
    pub fn slept(&self) -> Duration {
        Duration::from_millis(self.slept_millis.load(Ordering::SeqCst))
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Environment for SimEnv {
    fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.now_millis())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.slept_millis.fetch_add(duration_millis(duration), Ordering::SeqCst);
        self.advance(duration);
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_advances_shared_clock() {
        let env = SimEnv::starting_at(1000);
        let clone = env.clone();

        drop(clone.sleep(Duration::from_millis(250)));

        assert_eq!(env.now(), UNIX_EPOCH + Duration::from_millis(1250));
        assert_eq!(env.slept(), Duration::from_millis(250));
    }

    #[test]
    fn advance_does_not_count_as_sleep() {
        let env = SimEnv::new();
        let start = env.now_millis();
        env.advance(Duration::from_secs(1));
        assert_eq!(env.now_millis(), start + 1000);
        assert_eq!(env.slept(), Duration::ZERO);
    }
}
