use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide shutdown request, passed explicitly into blocking drain
/// operations.
///
/// Clones share the same flag. Drain loops check it between passes and stop
/// as soon as it is raised.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.
    #[inline]
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Determine whether the signal has been raised.
    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
