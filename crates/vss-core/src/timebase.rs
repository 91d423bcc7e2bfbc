use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since start.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Microseconds elapsed since `stamp_us`, saturating at zero.
    pub fn age_us(&self, stamp_us: u64) -> u64 {
        self.now_us().saturating_sub(stamp_us)
    }

    /// The `Instant` corresponding to a timestamp produced by this time base.
    pub fn instant_at(&self, stamp_us: u64) -> Instant {
        self.start + Duration::from_micros(stamp_us)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let tb = TimeBase::new();
        let a = tb.now_us();
        std::thread::sleep(Duration::from_millis(2));
        let b = tb.now_us();
        assert!(b >= a + 1_000);
    }

    #[test]
    fn age_saturates_for_future_stamps() {
        let tb = TimeBase::new();
        assert_eq!(tb.age_us(u64::MAX), 0);
    }

    #[test]
    fn instant_round_trips_through_stamp() {
        let tb = TimeBase::new();
        let stamp = tb.now_us();
        let at = tb.instant_at(stamp);
        assert!(at <= Instant::now());
    }
}
