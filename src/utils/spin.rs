//! Warnings for drain loops that spin for too long.

#[cfg(feature = "warned_spin")]
use std::time::Duration;

/// Tracks how long a drain loop has been spinning. With the `warned_spin`
/// feature enabled, warns once the loop exceeds one second; otherwise does
/// nothing.
pub(crate) struct SpinWarner {
    #[cfg(feature = "warned_spin")]
    start: quanta::Instant,
    #[cfg(feature = "warned_spin")]
    warned: bool,
    #[cfg_attr(not(feature = "warned_spin"), allow(dead_code))]
    what: &'static str,
}

impl SpinWarner {
    #[inline]
    pub fn new(what: &'static str) -> Self {
        Self {
            #[cfg(feature = "warned_spin")]
            start: quanta::Instant::now(),
            #[cfg(feature = "warned_spin")]
            warned: false,
            what,
        }
    }

    #[inline]
    pub fn tick(&mut self) {
        #[cfg(feature = "warned_spin")]
        if !self.warned && self.start.elapsed() > Duration::from_secs(1) {
            log::warn!("qpm: {} has been spinning for more than 1s", self.what);
            self.warned = true;
        }
    }
}
