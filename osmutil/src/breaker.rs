use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation. The router polls this at the top of every
/// iteration; the builders poll it between phases.
pub trait Breaker {
    fn is_aborted(&self) -> bool;
}

/// A breaker that can be tripped from another thread.
#[derive(Clone, Default)]
pub struct ThreadedBreaker(Arc<AtomicBool>);

impl ThreadedBreaker {
    pub fn new() -> ThreadedBreaker {
        ThreadedBreaker::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Breaker for ThreadedBreaker {
    fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The error a build pipeline returns when its breaker trips. Outputs of the
/// interrupted phase have already been closed fail-safe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cancelled by breaker")
    }
}

impl std::error::Error for Cancelled {}
