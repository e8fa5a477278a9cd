//! Wall-clock environment.

use std::{
    future::Future,
    time::{Duration, SystemTime},
};

use distlock_core::Environment;

/// Environment backed by the system clock and the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
