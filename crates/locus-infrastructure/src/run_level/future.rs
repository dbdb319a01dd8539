//! Handle to one run-level transition

use locus_domain::{Error, MultiResult};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Outcome of a transition: the level reached, or why it stopped
///
/// Clones observe the same transition.
#[derive(Clone)]
pub struct RunLevelFuture {
    inner: Arc<FutureInner>,
}

struct FutureInner {
    proposed: i32,
    cancelled: AtomicBool,
    outcome: Mutex<Option<MultiResult<i32>>>,
    completed: Condvar,
    notify: Notify,
}

impl RunLevelFuture {
    pub(crate) fn new(proposed: i32) -> Self {
        Self {
            inner: Arc::new(FutureInner {
                proposed,
                cancelled: AtomicBool::new(false),
                outcome: Mutex::new(None),
                completed: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Level this transition is heading to
    pub fn proposed_level(&self) -> i32 {
        self.inner.proposed
    }

    /// Request cancellation
    ///
    /// Observed before the next level begins and by idle workers of the
    /// level in progress. Returns `false` when the transition already ended.
    pub fn cancel(&self) -> bool {
        if self.is_done() {
            return false;
        }
        self.inner.cancelled.store(true, Ordering::Release);
        true
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Whether the transition ended
    pub fn is_done(&self) -> bool {
        self.inner.outcome.lock().is_some()
    }

    /// Block until the transition ends
    pub fn get(&self) -> MultiResult<i32> {
        let mut outcome = self.inner.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.inner.completed.wait(&mut outcome);
        }
    }

    /// Block until the transition ends or `timeout` elapses
    pub fn get_timeout(&self, timeout: Duration) -> MultiResult<i32> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.inner.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            if self
                .inner
                .completed
                .wait_until(&mut outcome, deadline)
                .timed_out()
                && outcome.is_none()
            {
                return Err(Error::Timeout {
                    message: format!(
                        "run level transition to {} did not finish within {timeout:?}",
                        self.inner.proposed
                    ),
                }
                .into());
            }
        }
    }

    /// Wait for the transition without blocking the async runtime
    pub async fn wait(&self) -> MultiResult<i32> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(result) = self.inner.outcome.lock().clone() {
                return result;
            }
            notified.await;
        }
    }

    pub(crate) fn complete(&self, result: MultiResult<i32>) {
        *self.inner.outcome.lock() = Some(result);
        self.inner.completed.notify_all();
        self.inner.notify.notify_waiters();
    }

    pub(crate) fn same_as(&self, other: &RunLevelFuture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RunLevelFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLevelFuture")
            .field("proposed", &self.inner.proposed)
            .field("cancelled", &self.is_cancelled())
            .field("done", &self.is_done())
            .finish()
    }
}
