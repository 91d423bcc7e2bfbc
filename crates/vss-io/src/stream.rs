//! Blocking byte-stream transport (stdin, a serial device node, a pipe).

use crate::metrics::record_feed;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use vss_core::{LinkEvent, SpeedReceiver};

/// Feeds `reader` into `receiver` until EOF, a read error, or `stop`.
/// The stream counts as connected for its whole lifetime.
pub fn run_stream<R: Read>(mut reader: R, receiver: &mut SpeedReceiver, stop: &AtomicBool) {
    receiver.handle(LinkEvent::Connected);
    let mut temp = [0u8; 1024];

    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut temp) {
            Ok(0) => {
                info!("Input stream closed");
                break;
            }
            Ok(n) => {
                let summary = receiver.handle(LinkEvent::Data(&temp[..n]));
                record_feed(&summary);
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(error = %err, "Input stream read error");
                break;
            }
        }
    }

    let stats = receiver.framer_stats();
    debug!(lines = stats.lines, overflows = stats.overflows, "Input stream finished");
    receiver.handle(LinkEvent::Disconnected);
}
