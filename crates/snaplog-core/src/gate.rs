// ── Readiness gate ──
//
// Blocks callers until a predicate over shared state holds. The refresh
// loop notifies after every snapshot install; waiters also re-check on a
// bounded interval so predicates over state that never notifies still
// make progress.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Error;

/// Blocking wait primitive with a default timeout.
#[derive(Debug)]
pub struct ReadinessGate {
    lock: Mutex<()>,
    cond: Condvar,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReadinessGate {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
            timeout,
            poll_interval,
        }
    }

    /// Default timeout applied by [`wait`](Self::wait).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for `predicate` using the gate's default timeout.
    pub fn wait<F>(&self, predicate: F) -> Result<(), Error>
    where
        F: FnMut() -> bool,
    {
        self.wait_for(predicate, self.timeout)
    }

    /// Block until `predicate` returns `true` or `timeout` elapses.
    ///
    /// The predicate runs with the gate's internal lock held, so it must
    /// not call back into [`notify_all`](Self::notify_all).
    pub fn wait_for<F>(&self, mut predicate: F, timeout: Duration) -> Result<(), Error>
    where
        F: FnMut() -> bool,
    {
        // An unrepresentable deadline means "wait forever".
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock.lock();

        loop {
            if predicate() {
                return Ok(());
            }
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(Error::Timeout { waited: timeout });
                    }
                    remaining.min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            self.cond.wait_for(&mut guard, slice);
        }
    }

    /// Wake every waiter so it re-evaluates its predicate.
    pub fn notify_all(&self) {
        // Taking the lock orders this wake-up after any in-flight predicate
        // check, so a waiter cannot miss it.
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}
