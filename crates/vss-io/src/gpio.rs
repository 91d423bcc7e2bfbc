//! Linux sysfs GPIO output for the VSS line.
//!
//! The pin drives the base of an NPN transistor whose collector pulls the VSS
//! line low, so with `active_high` a sunk line is written as `1`.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use vss_core::{OutputLevel, PulseOutput};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to export gpio {pin}: {source}")]
    Export {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set gpio {pin} as output: {source}")]
    Direction {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open gpio {pin} value: {source}")]
    Open {
        pin: u32,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct GpioConfig {
    pub pin: u32,
    pub active_high: bool,
    pub sysfs_root: PathBuf,
}

impl GpioConfig {
    pub fn new(pin: u32) -> Self {
        Self {
            pin,
            active_high: true,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}

pub struct SysfsGpio {
    pin: u32,
    active_high: bool,
    value: File,
    write_failures: u64,
    last_write_ok: bool,
}

impl SysfsGpio {
    /// Exports the pin if needed, makes it an output and releases the line.
    pub fn open(config: &GpioConfig) -> Result<Self, OutputError> {
        let pin = config.pin;
        let pin_dir = config.sysfs_root.join(format!("gpio{pin}"));

        if !pin_dir.exists() {
            write_attr(&config.sysfs_root.join("export"), &pin.to_string())
                .map_err(|source| OutputError::Export { pin, source })?;
        }
        write_attr(&pin_dir.join("direction"), "out")
            .map_err(|source| OutputError::Direction { pin, source })?;

        let value = OpenOptions::new()
            .write(true)
            .open(pin_dir.join("value"))
            .map_err(|source| OutputError::Open { pin, source })?;

        let mut gpio = Self {
            pin,
            active_high: config.active_high,
            value,
            write_failures: 0,
            last_write_ok: true,
        };
        gpio.set_level(OutputLevel::Released);
        info!(pin, active_high = config.active_high, "GPIO output ready");
        Ok(gpio)
    }

    fn raw(&self, level: OutputLevel) -> &'static [u8] {
        match (level, self.active_high) {
            (OutputLevel::Sunk, true) | (OutputLevel::Released, false) => b"1",
            (OutputLevel::Released, true) | (OutputLevel::Sunk, false) => b"0",
        }
    }
}

impl PulseOutput for SysfsGpio {
    fn set_level(&mut self, level: OutputLevel) {
        let raw = self.raw(level);
        let result = self
            .value
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value.write_all(raw));
        self.last_write_ok = result.is_ok();
        if let Err(err) = result {
            self.write_failures += 1;
            // Log the first failure and then every thousandth.
            if self.write_failures % 1000 == 1 {
                warn!(pin = self.pin, failures = self.write_failures, error = %err, "GPIO write failed");
            }
        }
    }

    fn write_failures(&self) -> u64 {
        self.write_failures
    }

    fn is_healthy(&self) -> bool {
        self.last_write_ok
    }
}

fn write_attr(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(value.as_bytes())
}
