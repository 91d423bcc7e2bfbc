use crate::runtime::config::{PulseSettings, RuntimeConfig};
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use std::process::ExitCode;
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vss_core::{
    OutputLevel, PulseConfig, PulseOutput, PulseThread, SimulatedOutput, SpeedExchange,
    SpeedReceiver, TimeBase,
};
use vss_io::metrics::{OUTPUT_EDGES, OUTPUT_LEVEL};
use vss_io::{
    bind_link, record_output_health, run_link, run_stream, GpioConfig, LinkConfig, SysfsGpio,
};

enum OutputSink {
    Simulated(SimulatedOutput),
    Gpio(SysfsGpio),
}

/// Output handed to the pulse thread: dispatches to the configured sink and
/// mirrors every edge and the sink's health into the metrics.
struct VssOutput {
    sink: OutputSink,
    level: OutputLevel,
    failures_seen: u64,
}

impl VssOutput {
    fn sink(&self) -> &dyn PulseOutput {
        match &self.sink {
            OutputSink::Simulated(o) => o,
            OutputSink::Gpio(o) => o,
        }
    }
}

impl PulseOutput for VssOutput {
    fn set_level(&mut self, level: OutputLevel) {
        match &mut self.sink {
            OutputSink::Simulated(o) => o.set_level(level),
            OutputSink::Gpio(o) => o.set_level(level),
        }
        if level != self.level {
            OUTPUT_EDGES.inc();
            OUTPUT_LEVEL.set(level.as_f64());
            self.level = level;
        }

        let failures = self.write_failures();
        record_output_health(self.is_healthy(), failures - self.failures_seen);
        self.failures_seen = failures;
    }

    fn write_failures(&self) -> u64 {
        self.sink().write_failures()
    }

    fn is_healthy(&self) -> bool {
        self.sink().is_healthy()
    }
}

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vss-pulse: {e}");
            RuntimeConfig::print_help();
            return ExitCode::FAILURE;
        }
    };
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> ExitCode {
    init_tracing(config.json_logs);

    let settings = match config.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let timebase = TimeBase::new();
    let exchange = Arc::new(SpeedExchange::new(settings.calibration));
    let stop = Arc::new(AtomicBool::new(false));

    let output = match build_output(&config, timebase) {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "Failed to initialize output");
            return ExitCode::FAILURE;
        }
    };

    let link_listener = if config.link_enabled {
        let link_config = LinkConfig {
            bind_addr: config.bind_addr.clone(),
            ..LinkConfig::default()
        };
        match bind_link(&link_config) {
            Ok(listener) => Some((listener, link_config)),
            Err(e) => {
                error!(error = %e, "Failed to start link");
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!("Link disabled");
        None
    };

    log_settings(&settings);

    let pulse_handle = {
        let exchange = Arc::clone(&exchange);
        let pulse_config = PulseConfig {
            timing: settings.timing.clone(),
            ..PulseConfig::default()
        };
        thread::spawn(move || {
            let mut pulse = PulseThread::new(output, pulse_config, exchange, timebase);
            pulse.run();
            debug!(phase = ?pulse.phase(), level = ?pulse.level(), "Pulse thread stopped");
            pulse.stats().clone()
        })
    };

    let link_handle = link_listener.map(|(listener, link_config)| {
        let exchange = Arc::clone(&exchange);
        let stop = Arc::clone(&stop);
        let line_capacity = settings.line_capacity;
        thread::spawn(move || {
            let mut receiver = SpeedReceiver::new(exchange, timebase, line_capacity);
            run_link(&listener, &mut receiver, &link_config, &stop);
        })
    });

    if config.stdin_enabled {
        let exchange = Arc::clone(&exchange);
        let stop = Arc::clone(&stop);
        let line_capacity = settings.line_capacity;
        info!("Reading speed lines from stdin");
        // Blocked in read() most of the time, so it is left detached.
        thread::spawn(move || {
            let mut receiver = SpeedReceiver::new(exchange, timebase, line_capacity);
            run_stream(std::io::stdin().lock(), &mut receiver, &stop);
        });
    }

    let heartbeat_handle =
        telemetry::start_heartbeat(Arc::clone(&exchange), timebase, Arc::clone(&stop));

    info!("VSS pulse generator running");

    // Without a time limit the pulse thread only returns if it panics.
    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        thread::sleep(Duration::from_secs(seconds));
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        exchange.shutdown();
    }

    let stats = match pulse_handle.join() {
        Ok(stats) => stats,
        Err(_) => {
            error!("Pulse thread panicked");
            stop.store(true, std::sync::atomic::Ordering::Relaxed);
            return ExitCode::FAILURE;
        }
    };
    if let Some(handle) = link_handle {
        if handle.join().is_err() {
            warn!("Link thread panicked");
        }
    }
    let _ = heartbeat_handle.join();

    info!(
        edges = stats.edges,
        wakes = stats.wakes,
        idles = stats.idles,
        updates = stats.updates,
        max_lateness_us = stats.max_lateness_us,
        "Run complete"
    );
    ExitCode::SUCCESS
}

fn build_output(config: &RuntimeConfig, timebase: TimeBase) -> Result<VssOutput, vss_io::OutputError> {
    let sink = match config.gpio_pin {
        Some(pin) => {
            let gpio_config = GpioConfig {
                active_high: config.gpio_active_high,
                ..GpioConfig::new(pin)
            };
            OutputSink::Gpio(SysfsGpio::open(&gpio_config)?)
        }
        None => {
            info!("No GPIO configured, using simulated output");
            OutputSink::Simulated(SimulatedOutput::new(timebase))
        }
    };
    Ok(VssOutput {
        sink,
        level: OutputLevel::Released,
        failures_seen: 0,
    })
}

fn log_settings(settings: &PulseSettings) {
    info!(
        pulses_per_mile = settings.calibration.pulses_per_mile,
        max_speed_mph = settings.calibration.max_speed_mph,
        stale_ms = settings.timing.stale_timeout.as_millis() as u64,
        min_half_us = settings.timing.min_half_period.as_micros() as u64,
        max_half_us = settings.timing.max_half_period.as_micros() as u64,
        line_capacity = settings.line_capacity,
        "Starting pulse thread"
    );
}
