use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vss_core::{Calibration, CalibrationError, PulseTiming, TimingError, DEFAULT_LINE_CAPACITY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing value for {flag}")]
    MissingValue { flag: String },

    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("failed to read calibration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse calibration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("line capacity must be at least 1")]
    ZeroLineCapacity,

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Timing(#[from] TimingError),
}

/// On-disk calibration. Every field is optional; command-line flags win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationFile {
    pub calibration: Calibration,
    pub stale_ms: Option<u64>,
    pub min_half_us: Option<u64>,
    pub max_half_us: Option<u64>,
    pub line_capacity: Option<usize>,
}

impl CalibrationFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved and validated pulse settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseSettings {
    pub calibration: Calibration,
    pub timing: PulseTiming,
    pub line_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub link_enabled: bool,
    pub stdin_enabled: bool,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub gpio_pin: Option<u32>,
    pub gpio_active_high: bool,
    pub calibration_path: Option<PathBuf>,
    pub pulses_per_mile: Option<f64>,
    pub stale_ms: Option<u64>,
    pub min_half_us: Option<u64>,
    pub max_half_us: Option<u64>,
    pub line_capacity: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            bind_addr: "127.0.0.1:7100".to_string(),
            link_enabled: true,
            stdin_enabled: false,
            json_logs: false,
            metrics_addr: None,
            gpio_pin: None,
            gpio_active_high: true,
            calibration_path: None,
            pulses_per_mile: None,
            stale_ms: None,
            min_half_us: None,
            max_half_us: None,
            line_capacity: None,
        }
    }
}

fn value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, ConfigError> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue { flag: flag.clone() })
}

fn parsed<T: std::str::FromStr>(args: &[String], i: &mut usize) -> Result<T, ConfigError> {
    let flag = args[*i].clone();
    let raw = value(args, i)?;
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        flag,
        value: raw.to_string(),
    })
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--run-seconds" => cfg.run_seconds = Some(parsed(args, &mut i)?),
                "--bind" => cfg.bind_addr = value(args, &mut i)?.to_string(),
                "--no-link" => cfg.link_enabled = false,
                "--stdin" => cfg.stdin_enabled = true,
                "--json-logs" => cfg.json_logs = true,
                "--metrics-addr" => cfg.metrics_addr = Some(value(args, &mut i)?.to_string()),
                "--gpio" => cfg.gpio_pin = Some(parsed(args, &mut i)?),
                "--gpio-active-low" => cfg.gpio_active_high = false,
                "--calibration" => {
                    cfg.calibration_path = Some(PathBuf::from(value(args, &mut i)?));
                }
                "--pulses-per-mile" => cfg.pulses_per_mile = Some(parsed(args, &mut i)?),
                "--stale-ms" => cfg.stale_ms = Some(parsed(args, &mut i)?),
                "--min-half-us" => cfg.min_half_us = Some(parsed(args, &mut i)?),
                "--max-half-us" => cfg.max_half_us = Some(parsed(args, &mut i)?),
                "--line-capacity" => cfg.line_capacity = Some(parsed(args, &mut i)?),
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                other => {
                    return Err(ConfigError::InvalidValue {
                        flag: "argument".to_string(),
                        value: other.to_string(),
                    });
                }
            }
            i += 1;
        }
        Ok(cfg)
    }

    /// Merges the calibration file (if any) with command-line overrides and
    /// validates the result.
    pub fn resolve(&self) -> Result<PulseSettings, ConfigError> {
        let file = match &self.calibration_path {
            Some(path) => CalibrationFile::load(path)?,
            None => CalibrationFile::default(),
        };

        let mut calibration = file.calibration;
        if let Some(ppm) = self.pulses_per_mile {
            calibration.pulses_per_mile = ppm;
        }
        calibration.validate()?;

        let mut timing = PulseTiming::default();
        if let Some(ms) = self.stale_ms.or(file.stale_ms) {
            timing.stale_timeout = Duration::from_millis(ms);
        }
        if let Some(us) = self.min_half_us.or(file.min_half_us) {
            timing.min_half_period = Duration::from_micros(us);
        }
        if let Some(us) = self.max_half_us.or(file.max_half_us) {
            timing.max_half_period = Duration::from_micros(us);
        }
        timing.validate()?;

        let line_capacity = self
            .line_capacity
            .or(file.line_capacity)
            .unwrap_or(DEFAULT_LINE_CAPACITY);
        if line_capacity == 0 {
            return Err(ConfigError::ZeroLineCapacity);
        }

        Ok(PulseSettings {
            calibration,
            timing,
            line_capacity,
        })
    }

    pub fn print_help() {
        println!(
            r#"vss-pulse - Speed-to-VSS pulse generator

Reads newline-delimited speed readings (e.g. "42.5", "MPH:42.5", "mph=42.5")
and drives a 50% duty square wave whose frequency tracks the speed.

USAGE:
    vss-pulse [OPTIONS]

OPTIONS:
    --bind <ADDR>            Link TCP bind address [default: 127.0.0.1:7100]
    --no-link                Disable the TCP link
    --stdin                  Also read speed lines from stdin
    --run-seconds <SECS>     Run for a fixed duration then exit
    --json-logs              Output logs in JSON format
    --metrics-addr <ADDR>    Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --gpio <PIN>             Drive sysfs GPIO <PIN> (default: simulated output)
    --gpio-active-low        Write 0 to sink the line instead of 1
    --calibration <PATH>     JSON calibration file
    --pulses-per-mile <N>    Pulses per mile [default: 4140]
    --stale-ms <MS>          Stop pulsing after this long without data [default: 1500]
    --min-half-us <US>       Shortest half-period [default: 200]
    --max-half-us <US>       Longest half-period [default: 500000]
    --line-capacity <N>      Longest accepted line in bytes [default: 255]
    -h, --help               Print this help message

CALIBRATION FILE:
    {{ "calibration": {{ "pulses_per_mile": 4140, "max_speed_mph": 200 }},
      "stale_ms": 1500, "min_half_us": 200, "max_half_us": 500000 }}

ENVIRONMENT VARIABLES:
    RUST_LOG                 Set log filter (e.g., RUST_LOG=debug,vss_core=trace)

EXAMPLES:
    # Simulated output, feed speeds by hand
    vss-pulse --no-link --stdin

    # Raspberry Pi, GPIO 25, with metrics
    vss-pulse --gpio 25 --metrics-addr 0.0.0.0:9090
"#
        );
    }
}
