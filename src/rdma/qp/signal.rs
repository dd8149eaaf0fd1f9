/// Selective send completion policy.
///
/// Sends request a completion once every `threshold + 1` posts, and always
/// on the first post after creation. Callers may additionally force a
/// signal (zero-copy buffers). The counter only advances on posts that the
/// hardware accepted, see [`Self::record`].
#[derive(Debug, Clone)]
pub struct UnsignaledSendCounter {
    /// Number of unsignaled sends allowed between two signaled ones.
    threshold: u32,

    /// Unsignaled sends since the last signaled one.
    count: u32,

    /// No send has been posted yet.
    first: bool,

    /// Whether the last posted send requested a completion.
    last_signaled: bool,
}

impl UnsignaledSendCounter {
    /// Create a counter that allows `threshold` unsignaled sends in a row.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            count: 0,
            first: true,
            last_signaled: true,
        }
    }

    /// Decide whether the next send must request a completion.
    #[inline]
    pub fn should_signal(&self, force: bool) -> bool {
        force || self.first || self.count >= self.threshold
    }

    /// Account for a posted send.
    #[inline]
    pub fn record(&mut self, signaled: bool) {
        self.first = false;
        self.last_signaled = signaled;
        if signaled {
            self.count = 0;
        } else {
            self.count += 1;
        }
    }

    /// Determine whether the last posted send requested a completion. This
    /// is also `true` if nothing was ever posted.
    #[inline]
    pub fn is_last_signaled(&self) -> bool {
        self.last_signaled
    }

    /// Get the number of unsignaled sends since the last signaled one.
    #[inline]
    pub fn unsignaled(&self) -> u32 {
        self.count
    }
}
