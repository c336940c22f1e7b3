//! Deadlines for blocking socket operations.
//!
//! Every blocking call (accept, connect, read, write) converts its timeout
//! into an absolute [`Deadline`] once, then re-waits on the remaining time
//! after each wakeup. Spurious wakeups therefore never extend the total wait.

use parking_lot::{Condvar, MutexGuard};
use std::time::{Duration, Instant};

/// Normalize a socket timeout: `None` and zero both mean "wait indefinitely".
pub(crate) fn normalize_timeout(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|d| !d.is_zero())
}

/// Absolute point in time after which a blocking operation gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    timeout: Option<Duration>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn never() -> Self {
        Self {
            at: None,
            timeout: None,
        }
    }

    /// Deadline `timeout` from now. `None` or zero never expires.
    pub fn after(timeout: Option<Duration>) -> Self {
        match normalize_timeout(timeout) {
            Some(timeout) => Self {
                at: Instant::now().checked_add(timeout),
                timeout: Some(timeout),
            },
            None => Self::never(),
        }
    }

    /// The timeout this deadline was computed from.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Time left before expiry; `None` when the deadline never expires.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        match self.at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Block on `condvar` until notified or the deadline passes.
    ///
    /// Returns `false` once the deadline has passed. Callers loop and re-check
    /// their predicate on `true`, since wakeups may be spurious.
    pub(crate) fn wait<T>(&self, condvar: &Condvar, guard: &mut MutexGuard<'_, T>) -> bool {
        match self.at {
            Some(at) => {
                if Instant::now() >= at {
                    return false;
                }
                !condvar.wait_until(guard, at).timed_out()
            }
            None => {
                condvar.wait(guard);
                true
            }
        }
    }
}
