//! Clock abstraction.
//!
//! The state machine takes `now` as a parameter; drivers get it from an
//! [`Environment`] so simulations can substitute virtual time.

use std::{future::Future, time::Instant};

/// Source of time for session drivers.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Resolve once `deadline` has passed.
    fn sleep_until(&self, deadline: Instant) -> impl Future<Output = ()> + Send;
}

/// Environment backed by tokio's clock.
///
/// Reads time through `tokio::time` so a paused or simulated runtime
/// (`tokio::time::pause`, turmoil) drives sessions in virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep_until(&self, deadline: Instant) -> impl Future<Output = ()> + Send {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline))
    }
}
