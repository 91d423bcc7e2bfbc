use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vss_core::{SpeedExchange, TimeBase};
use vss_io::metrics::{
    init_metrics, serve_metrics, LINK_CONNECTED, SPEED_MPH, TARGET_HZ, UPDATE_AGE_MS,
};

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Periodic heartbeat: refreshes the gauges and logs link/speed status.
/// Independent of the pulse thread; ends when `stop` is set.
pub fn start_heartbeat(
    exchange: Arc<SpeedExchange>,
    timebase: TimeBase,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut next_beat = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            if Instant::now() >= next_beat {
                let record = exchange.snapshot();
                let connected = exchange.link_connected();
                let age_ms = if record.generation == 0 {
                    None
                } else {
                    Some(timebase.age_us(record.last_update_us) / 1_000)
                };

                SPEED_MPH.set(record.speed_mph);
                TARGET_HZ.set(record.target_hz);
                LINK_CONNECTED.set(if connected { 1.0 } else { 0.0 });
                if let Some(age) = age_ms {
                    UPDATE_AGE_MS.set(age as f64);
                }

                debug!(
                    connected,
                    speed_mph = record.speed_mph,
                    target_hz = record.target_hz,
                    age_ms = ?age_ms,
                    "Heartbeat"
                );
                next_beat += HEARTBEAT_PERIOD;
            }
            thread::sleep(Duration::from_millis(100));
        }
    })
}
