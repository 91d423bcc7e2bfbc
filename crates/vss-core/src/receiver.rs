//! Reception context: bytes in, speed updates out.

use crate::calibration::SpeedSample;
use crate::extract::extract_speed;
use crate::framer::{FramerStats, LineFramer};
use crate::sync::{SpeedExchange, SpeedRecord};
use crate::timebase::TimeBase;
use std::sync::Arc;

/// What a transport reports to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent<'a> {
    Connected,
    Data(&'a [u8]),
    Disconnected,
}

/// Result of handling one event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedSummary {
    pub accepted: u64,
    pub rejected: u64,
    pub overflowed: u64,
    pub last_record: Option<SpeedRecord>,
}

pub struct SpeedReceiver {
    framer: LineFramer,
    exchange: Arc<SpeedExchange>,
    timebase: TimeBase,
}

impl SpeedReceiver {
    pub fn new(exchange: Arc<SpeedExchange>, timebase: TimeBase, line_capacity: usize) -> Self {
        Self {
            framer: LineFramer::new(line_capacity),
            exchange,
            timebase,
        }
    }

    pub fn handle(&mut self, event: LinkEvent<'_>) -> FeedSummary {
        match event {
            LinkEvent::Connected => {
                self.framer.reset();
                self.exchange.set_link_connected(true);
                FeedSummary::default()
            }
            LinkEvent::Data(bytes) => self.feed(bytes),
            LinkEvent::Disconnected => {
                if self.framer.pending() > 0 {
                    log::debug!("dropping {} bytes of a partial line", self.framer.pending());
                }
                self.framer.reset();
                self.exchange.set_link_connected(false);
                FeedSummary::default()
            }
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> FeedSummary {
        let Self {
            framer,
            exchange,
            timebase,
        } = self;
        let overflows_before = framer.stats().overflows;
        let mut summary = FeedSummary::default();

        framer.feed(bytes, |line| match extract_speed(line) {
            Some(raw) => {
                let sample = SpeedSample::clamped(raw, exchange.calibration(), timebase.now_us());
                let record = exchange.publish(sample);
                log::debug!(
                    "speed {:.2} mph -> {:.2} Hz (from {:?})",
                    record.speed_mph,
                    record.target_hz,
                    line
                );
                summary.accepted += 1;
                summary.last_record = Some(record);
            }
            None => {
                log::trace!("ignoring line without a speed: {:?}", line);
                summary.rejected += 1;
            }
        });

        summary.overflowed = framer.stats().overflows - overflows_before;
        summary
    }

    pub fn framer_stats(&self) -> &FramerStats {
        self.framer.stats()
    }

    pub fn exchange(&self) -> &Arc<SpeedExchange> {
        &self.exchange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use crate::framer::DEFAULT_LINE_CAPACITY;

    fn receiver() -> SpeedReceiver {
        SpeedReceiver::new(
            Arc::new(SpeedExchange::new(Calibration::default())),
            TimeBase::new(),
            DEFAULT_LINE_CAPACITY,
        )
    }

    #[test]
    fn mph_30_yields_34_5_hz() {
        let mut rx = receiver();
        let summary = rx.handle(LinkEvent::Data(b"mph=30\n"));
        assert_eq!(summary.accepted, 1);
        let record = rx.exchange().snapshot();
        assert!((record.target_hz - 34.5).abs() < 1e-9);
    }

    #[test]
    fn clamps_before_publishing() {
        let mut rx = receiver();
        rx.feed(b"-5\n");
        assert_eq!(rx.exchange().snapshot().speed_mph, 0.0);
        rx.feed(b"250\n");
        assert_eq!(rx.exchange().snapshot().speed_mph, 200.0);
    }

    #[test]
    fn garbage_lines_leave_state_untouched() {
        let mut rx = receiver();
        rx.feed(b"mph=12\n");
        let summary = rx.feed(b"hello\n-\n");
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.rejected, 2);
        let record = rx.exchange().snapshot();
        assert_eq!(record.generation, 1);
        assert_eq!(record.speed_mph, 12.0);
    }

    #[test]
    fn disconnect_discards_partial_line() {
        let mut rx = receiver();
        rx.handle(LinkEvent::Connected);
        assert!(rx.exchange().link_connected());
        rx.handle(LinkEvent::Data(b"mph=1"));
        rx.handle(LinkEvent::Disconnected);
        assert!(!rx.exchange().link_connected());
        rx.handle(LinkEvent::Connected);
        rx.handle(LinkEvent::Data(b"5\n"));
        assert_eq!(rx.exchange().snapshot().speed_mph, 5.0);
    }

    #[test]
    fn overflow_is_reported() {
        let exchange = Arc::new(SpeedExchange::default());
        let mut rx = SpeedReceiver::new(exchange, TimeBase::new(), 4);
        let summary = rx.feed(b"123456789\n7\n");
        assert_eq!(summary.overflowed, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(rx.exchange().snapshot().speed_mph, 7.0);
    }
}
