use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vss_core::{
    Calibration, EdgeLog, OutputLevel, PulseConfig, PulseThread, PulseTiming, SimulatedOutput,
    SpeedExchange, SpeedReceiver, TimeBase, DEFAULT_LINE_CAPACITY,
};
use vss_io::{bind_link, run_link, LinkConfig};

struct Harness {
    exchange: Arc<SpeedExchange>,
    log: EdgeLog,
    addr: String,
    stop: Arc<AtomicBool>,
    link: Option<thread::JoinHandle<()>>,
    pulse: Option<thread::JoinHandle<()>>,
}

impl Harness {
    fn start(stale_timeout: Duration) -> Self {
        let timebase = TimeBase::new();
        let exchange = Arc::new(SpeedExchange::new(Calibration::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let config = LinkConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..LinkConfig::default()
        };
        let listener = bind_link(&config).expect("bind link");
        let addr = listener.local_addr().expect("local addr").to_string();

        let link = {
            let exchange = Arc::clone(&exchange);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut receiver = SpeedReceiver::new(exchange, timebase, DEFAULT_LINE_CAPACITY);
                run_link(&listener, &mut receiver, &config, &stop);
            })
        };

        let output = SimulatedOutput::new(timebase);
        let log = output.log();
        let pulse = {
            let exchange = Arc::clone(&exchange);
            let config = PulseConfig {
                timing: PulseTiming {
                    stale_timeout,
                    ..PulseTiming::default()
                },
                ..PulseConfig::default()
            };
            thread::spawn(move || {
                PulseThread::new(output, config, exchange, timebase).run();
            })
        };

        Self {
            exchange,
            log,
            addr,
            stop,
            link: Some(link),
            pulse: Some(pulse),
        }
    }

    fn wait_for(&self, what: &str, cond: impl Fn(&Self) -> bool) {
        let start = Instant::now();
        while !cond(self) {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.exchange.shutdown();
        if let Some(handle) = self.link.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.pulse.take() {
            let _ = handle.join();
        }
    }
}

#[test]
fn chunked_line_drives_pulses_then_goes_stale() {
    let harness = Harness::start(Duration::from_millis(300));
    let mut stream = TcpStream::connect(&harness.addr).expect("connect");

    for chunk in [&b"mp"[..], b"h=3", b"0\r", b"\n"] {
        stream.write_all(chunk).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(10));
    }

    harness.wait_for("speed update", |h| h.exchange.snapshot().generation == 1);
    let record = harness.exchange.snapshot();
    assert_eq!(record.speed_mph, 30.0);
    assert!((record.target_hz - 34.5).abs() < 1e-9);

    harness.wait_for("pulses", |h| h.log.toggles() >= 4);

    // Nothing more is sent: the output must settle released.
    thread::sleep(Duration::from_millis(600));
    assert_eq!(harness.log.level(), OutputLevel::Released);
    let settled = harness.log.toggles();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(harness.log.toggles(), settled);
}

#[test]
fn disconnect_discards_partial_line() {
    let harness = Harness::start(Duration::from_millis(1500));

    {
        let mut stream = TcpStream::connect(&harness.addr).expect("connect");
        harness.wait_for("connect", |h| h.exchange.link_connected());
        stream.write_all(b"mph=1").unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
    }
    harness.wait_for("disconnect", |h| !h.exchange.link_connected());

    let mut stream = TcpStream::connect(&harness.addr).expect("reconnect");
    harness.wait_for("reconnect", |h| h.exchange.link_connected());
    stream.write_all(b"5\n").unwrap();
    stream.flush().unwrap();

    harness.wait_for("speed update", |h| h.exchange.snapshot().generation == 1);
    assert_eq!(harness.exchange.snapshot().speed_mph, 5.0);
}

#[test]
fn garbage_and_overlong_lines_are_ignored() {
    let harness = Harness::start(Duration::from_millis(1500));
    let mut stream = TcpStream::connect(&harness.addr).expect("connect");

    let overlong = vec![b'9'; DEFAULT_LINE_CAPACITY + 10];
    stream.write_all(b"hello\n").unwrap();
    stream.write_all(&overlong).unwrap();
    stream.write_all(b"\nMPH:12.34\n").unwrap();
    stream.flush().unwrap();

    harness.wait_for("speed update", |h| h.exchange.snapshot().generation >= 1);
    let record = harness.exchange.snapshot();
    assert_eq!(record.generation, 1);
    assert_eq!(record.speed_mph, 12.34);
}
