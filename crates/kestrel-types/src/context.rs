//! Cancellable, optionally time-boxed execution context.
//!
//! A [`Context`] is handed to every command and to every fan-out worker.
//! Cancelling a context cancels all of its children; cancelling a child never
//! reaches the parent. A deadline behaves like a cancellation that fires on
//! its own once the instant passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Result, ShellError};

/// Granularity of [`Context::sleep`] cancellation checks.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct Context {
    /// Own flag last; ancestors' flags before it.
    flags: Vec<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context with no deadline.
    pub fn background() -> Self {
        Self {
            flags: vec![Arc::new(AtomicBool::new(false))],
            deadline: None,
        }
    }

    /// Root context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().child_with_timeout(timeout)
    }

    /// Child context sharing this context's cancellation and deadline.
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Self {
            flags,
            deadline: self.deadline,
        }
    }

    /// Child context whose deadline is the earlier of the parent's and
    /// `now + timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let mut child = self.child();
        let candidate = Instant::now().checked_add(timeout);
        child.deadline = match (self.deadline, candidate) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        child
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.store(true, Ordering::SeqCst);
        }
    }

    /// Whether this context or an ancestor was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::SeqCst))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Cancelled or expired.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline (`None` = unlimited).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Clamp `timeout` to the time left before the deadline.
    pub fn clamp(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(left) => timeout.min(left),
            None => timeout,
        }
    }

    /// `Err(Cancelled)` once the context is done.
    pub fn check(&self) -> Result<()> {
        if self.is_done() {
            Err(ShellError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early with `Err(Cancelled)` when the
    /// context is cancelled or expires.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        // An unrepresentable end instant means "until cancelled".
        let end = Instant::now().checked_add(duration);
        loop {
            self.check()?;
            let now = Instant::now();
            let slice = match end {
                Some(end) if now >= end => return Ok(()),
                Some(end) => SLEEP_SLICE.min(end - now),
                None => SLEEP_SLICE,
            };
            std::thread::sleep(slice);
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
