use crate::calibration::{Calibration, SpeedSample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// The shared speed state. Always read and written as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedRecord {
    /// Bumped on every accepted update; 0 means nothing received yet.
    pub generation: u64,
    pub speed_mph: f64,
    pub target_hz: f64,
    pub last_update_us: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitOutcome {
    Updated(SpeedRecord),
    DeadlineReached(SpeedRecord),
    Shutdown,
}

#[derive(Debug, Default)]
struct Shared {
    record: SpeedRecord,
    shutdown: bool,
}

/// Single coordination point between the reception side and the pulse thread.
///
/// Publishing a sample both stores the new record and wakes anything blocked
/// in [`SpeedExchange::wait_change`].
pub struct SpeedExchange {
    shared: Mutex<Shared>,
    changed: Condvar,
    calibration: Calibration,
    link_connected: AtomicBool,
}

impl SpeedExchange {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            shared: Mutex::new(Shared::default()),
            changed: Condvar::new(),
            calibration,
            link_connected: AtomicBool::new(false),
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Called by the reception side for every accepted sample.
    pub fn publish(&self, sample: SpeedSample) -> SpeedRecord {
        let mph = sample.value_mph();
        let record = {
            let mut shared = self.lock();
            shared.record = SpeedRecord {
                generation: shared.record.generation.wrapping_add(1),
                speed_mph: mph,
                target_hz: self.calibration.frequency_hz(mph),
                last_update_us: sample.observed_at_us(),
            };
            shared.record
        };
        self.changed.notify_all();
        record
    }

    pub fn snapshot(&self) -> SpeedRecord {
        self.lock().record
    }

    /// Blocks until a record newer than `seen_generation` is published, the
    /// deadline passes, or the exchange is shut down. With no deadline only
    /// an update or shutdown ends the wait.
    pub fn wait_change(&self, seen_generation: u64, deadline: Option<Instant>) -> WaitOutcome {
        let mut shared = self.lock();
        loop {
            if shared.shutdown {
                return WaitOutcome::Shutdown;
            }
            if shared.record.generation != seen_generation {
                return WaitOutcome::Updated(shared.record);
            }
            match deadline {
                None => {
                    shared = self
                        .changed
                        .wait(shared)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::DeadlineReached(shared.record);
                    }
                    shared = self
                        .changed
                        .wait_timeout(shared, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.changed.notify_all();
    }

    pub fn set_link_connected(&self, connected: bool) {
        self.link_connected.store(connected, Ordering::Relaxed);
    }

    pub fn link_connected(&self) -> bool {
        self.link_connected.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SpeedExchange {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn sample(mph: f64, at: u64) -> SpeedSample {
        SpeedSample::clamped(mph, &Calibration::default(), at)
    }

    #[test]
    fn publish_stores_consistent_record() {
        let exchange = SpeedExchange::default();
        let record = exchange.publish(sample(30.0, 1_000));
        assert_eq!(record.generation, 1);
        assert_eq!(record.last_update_us, 1_000);
        assert!((record.target_hz - 34.5).abs() < 1e-9);
        assert_eq!(exchange.snapshot(), record);
    }

    #[test]
    fn last_writer_wins() {
        let exchange = SpeedExchange::default();
        exchange.publish(sample(10.0, 1));
        exchange.publish(sample(20.0, 2));
        let record = exchange.snapshot();
        assert_eq!(record.generation, 2);
        assert_eq!(record.speed_mph, 20.0);
    }

    #[test]
    fn wait_returns_pending_update_immediately() {
        let exchange = SpeedExchange::default();
        exchange.publish(sample(5.0, 1));
        assert!(matches!(
            exchange.wait_change(0, None),
            WaitOutcome::Updated(r) if r.generation == 1
        ));
    }

    #[test]
    fn wait_times_out_without_update() {
        let exchange = SpeedExchange::default();
        let deadline = Instant::now() + Duration::from_millis(5);
        assert!(matches!(
            exchange.wait_change(0, Some(deadline)),
            WaitOutcome::DeadlineReached(_)
        ));
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn publish_wakes_blocked_waiter() {
        let exchange = Arc::new(SpeedExchange::default());
        let waiter = {
            let exchange = Arc::clone(&exchange);
            thread::spawn(move || exchange.wait_change(0, None))
        };
        thread::sleep(Duration::from_millis(20));
        exchange.publish(sample(12.0, 3));
        match waiter.join().unwrap() {
            WaitOutcome::Updated(record) => assert_eq!(record.speed_mph, 12.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shutdown_wakes_blocked_waiter() {
        let exchange = Arc::new(SpeedExchange::default());
        let waiter = {
            let exchange = Arc::clone(&exchange);
            thread::spawn(move || exchange.wait_change(0, None))
        };
        thread::sleep(Duration::from_millis(20));
        exchange.shutdown();
        assert_eq!(waiter.join().unwrap(), WaitOutcome::Shutdown);
        // Shutdown is sticky: later waits return at once.
        assert_eq!(exchange.wait_change(0, None), WaitOutcome::Shutdown);
    }

    #[test]
    fn concurrent_readers_never_see_torn_records() {
        let exchange = Arc::new(SpeedExchange::default());
        let writer = {
            let exchange = Arc::clone(&exchange);
            thread::spawn(move || {
                for i in 0..20_000u64 {
                    exchange.publish(sample((i % 200) as f64, i));
                }
            })
        };
        let cal = Calibration::default();
        for _ in 0..20_000 {
            let r = exchange.snapshot();
            assert_eq!(r.target_hz, cal.frequency_hz(r.speed_mph));
            if r.generation > 0 {
                assert_eq!(r.last_update_us, r.generation - 1);
            }
        }
        writer.join().unwrap();
    }
}
