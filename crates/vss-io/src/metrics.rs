//! Prometheus metrics for the VSS pulse generator.

use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};
use vss_core::tags::{self, Tag};
use vss_core::FeedSummary;

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(tag: Tag) -> IntCounter {
    let counter = IntCounter::new(tag.metric, tag.help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

fn gauge(tag: Tag) -> Gauge {
    let gauge = Gauge::new(tag.metric, tag.help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

// ============================================================================
// Reception Metrics
// ============================================================================

pub static LINES_ACCEPTED: LazyLock<IntCounter> =
    LazyLock::new(|| counter(tags::LINES_ACCEPTED));

pub static LINES_REJECTED: LazyLock<IntCounter> =
    LazyLock::new(|| counter(tags::LINES_REJECTED));

pub static LINES_OVERFLOWED: LazyLock<IntCounter> =
    LazyLock::new(|| counter(tags::LINES_OVERFLOWED));

pub static LINK_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::LINK_CONNECTED));

// ============================================================================
// Speed / Output Metrics
// ============================================================================

pub static SPEED_MPH: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::SPEED_MPH));

pub static TARGET_HZ: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::TARGET_HZ));

pub static UPDATE_AGE_MS: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::UPDATE_AGE_MS));

pub static OUTPUT_LEVEL: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::OUTPUT_LEVEL));

pub static OUTPUT_EDGES: LazyLock<IntCounter> = LazyLock::new(|| counter(tags::OUTPUT_EDGES));

/// Starts healthy; only a failed write clears it.
pub static OUTPUT_HEALTHY: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = gauge(tags::OUTPUT_HEALTHY);
    gauge.set(1.0);
    gauge
});

pub static OUTPUT_WRITE_FAILURES: LazyLock<IntCounter> =
    LazyLock::new(|| counter(tags::OUTPUT_WRITE_FAILURES));

/// Mirrors the output's health after a write. `new_failures` is the number
/// of failed writes since the previous call.
pub fn record_output_health(healthy: bool, new_failures: u64) {
    OUTPUT_WRITE_FAILURES.inc_by(new_failures);
    OUTPUT_HEALTHY.set(if healthy { 1.0 } else { 0.0 });
}

pub fn output_healthy() -> bool {
    OUTPUT_HEALTHY.get() >= 1.0
}

/// Applies the outcome of one receiver feed to the metrics.
pub fn record_feed(summary: &FeedSummary) {
    LINES_ACCEPTED.inc_by(summary.accepted);
    LINES_REJECTED.inc_by(summary.rejected);
    LINES_OVERFLOWED.inc_by(summary.overflowed);
    if let Some(record) = summary.last_record {
        SPEED_MPH.set(record.speed_mph);
        TARGET_HZ.set(record.target_hz);
    }
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    if output_healthy() {
                        let _ = request.respond(Response::from_string("OK"));
                    } else {
                        let _ = request.respond(
                            Response::from_string("Output failing").with_status_code(503),
                        );
                    }
                }
                "/ready" => {
                    // Ready once the link has delivered a usable speed
                    if LINES_ACCEPTED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = LINES_ACCEPTED.get();
    let _ = LINES_REJECTED.get();
    let _ = LINES_OVERFLOWED.get();
    let _ = LINK_CONNECTED.get();
    let _ = SPEED_MPH.get();
    let _ = TARGET_HZ.get();
    let _ = UPDATE_AGE_MS.get();
    let _ = OUTPUT_LEVEL.get();
    let _ = OUTPUT_EDGES.get();
    let _ = OUTPUT_HEALTHY.get();
    let _ = OUTPUT_WRITE_FAILURES.get();
}
