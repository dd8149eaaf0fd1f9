use std::os::fd::RawFd;

/// Asynchronous device event dispatcher.
///
/// Drain loops that stop making progress ask it to look for pending device
/// events, most importantly a fatal device error, so that the device removal
/// flag they wait on gets a chance to be raised.
pub trait EventHandler: Send + Sync {
    /// Poll the asynchronous event channel `async_fd` once and dispatch
    /// whatever is pending. Best effort: never blocks, never fails.
    fn query_for_ibverbs_event(&self, async_fd: RawFd);
}
