//! Wall-clock throttle for high-frequency event streams.
//!
//! DESIGN
//! ======
//! No timers, no scheduler. Each event asks `ready(now)`; the answer is yes
//! when at least `interval` has passed since the last yes. The first event
//! always passes, so a stream that fires once is never swallowed.

#[cfg(test)]
#[path = "throttle_test.rs"]
mod tests;

use std::time::{Duration, Instant};

/// Minimum interval between network-visible cursor updates.
pub const CURSOR_THROTTLE: Duration = Duration::from_millis(100);

/// Minimum interval between replica writes for an in-progress stroke.
pub const STROKE_THROTTLE: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// True when an emit is due at `now`; records the emit when it is.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = self.last.is_none_or(|last| now.duration_since(last) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Forget the last emit so the next event passes unconditionally.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
