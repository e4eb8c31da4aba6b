use std::time::{Duration, Instant};

/// Absolute deadline propagated from an inbound request
///
/// Every outbound call derives its timeout from the remaining budget, so
/// a slow rate-limit wait shrinks the time available to the upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline expiring `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// Deadline at an absolute instant
    pub const fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// The absolute instant this deadline fires
    pub const fn instant(self) -> Instant {
        self.0
    }

    /// Time left before the deadline, zero once elapsed
    pub fn remaining(self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has already elapsed
    pub fn is_elapsed(self) -> bool {
        self.remaining() == Duration::ZERO
    }
}
