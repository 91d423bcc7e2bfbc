//! Speed calibration: how a measured speed maps onto a pulse frequency.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Pulses per mile expected by a 2007 Impreza 2.5i cluster (4000 x 1.035).
pub const DEFAULT_PULSES_PER_MILE: f64 = 4140.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CalibrationError {
    #[error("pulses per mile must be finite and positive, got {0}")]
    InvalidPulsesPerMile(f64),
    #[error("speed bounds must be finite with 0 <= min <= max, got [{min}, {max}]")]
    InvalidSpeedBounds { min: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub pulses_per_mile: f64,
    pub min_speed_mph: f64,
    pub max_speed_mph: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pulses_per_mile: DEFAULT_PULSES_PER_MILE,
            min_speed_mph: 0.0,
            max_speed_mph: 200.0,
        }
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !self.pulses_per_mile.is_finite() || self.pulses_per_mile <= 0.0 {
            return Err(CalibrationError::InvalidPulsesPerMile(self.pulses_per_mile));
        }
        if !self.min_speed_mph.is_finite()
            || !self.max_speed_mph.is_finite()
            || self.min_speed_mph < 0.0
            || self.min_speed_mph > self.max_speed_mph
        {
            return Err(CalibrationError::InvalidSpeedBounds {
                min: self.min_speed_mph,
                max: self.max_speed_mph,
            });
        }
        Ok(())
    }

    /// Clamps a raw reading into the accepted speed range.
    pub fn clamp_speed(&self, raw_mph: f64) -> f64 {
        raw_mph.max(self.min_speed_mph).min(self.max_speed_mph)
    }

    /// Pulse frequency for a speed: `mph * pulses_per_mile / 3600`.
    pub fn frequency_hz(&self, mph: f64) -> f64 {
        mph * self.pulses_per_mile / SECONDS_PER_HOUR
    }
}

/// One accepted speed reading, already clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    value_mph: f64,
    observed_at_us: u64,
}

impl SpeedSample {
    pub fn clamped(raw_mph: f64, calibration: &Calibration, observed_at_us: u64) -> Self {
        Self {
            value_mph: calibration.clamp_speed(raw_mph),
            observed_at_us,
        }
    }

    pub fn value_mph(&self) -> f64 {
        self.value_mph
    }

    pub fn observed_at_us(&self) -> u64 {
        self.observed_at_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_negative_to_zero() {
        let sample = SpeedSample::clamped(-5.0, &Calibration::default(), 0);
        assert_eq!(sample.value_mph(), 0.0);
    }

    #[test]
    fn clamps_overspeed_to_max() {
        let sample = SpeedSample::clamped(250.0, &Calibration::default(), 0);
        assert_eq!(sample.value_mph(), 200.0);
    }

    #[test]
    fn clamps_infinity_to_max() {
        let sample = SpeedSample::clamped(f64::INFINITY, &Calibration::default(), 0);
        assert_eq!(sample.value_mph(), 200.0);
    }

    #[test]
    fn thirty_mph_is_thirty_four_and_a_half_hz() {
        let hz = Calibration::default().frequency_hz(30.0);
        assert!((hz - 34.5).abs() < 1e-9);
    }

    #[test]
    fn frequency_is_monotone_in_speed() {
        let cal = Calibration::default();
        let mut last = -1.0;
        for mph in 0..=200 {
            let hz = cal.frequency_hz(mph as f64);
            assert!(hz > last);
            last = hz;
        }
    }

    #[test]
    fn rejects_non_positive_pulses() {
        let cal = Calibration {
            pulses_per_mile: 0.0,
            ..Calibration::default()
        };
        assert_eq!(
            cal.validate(),
            Err(CalibrationError::InvalidPulsesPerMile(0.0))
        );
    }

    #[test]
    fn rejects_inverted_bounds() {
        let cal = Calibration {
            min_speed_mph: 10.0,
            max_speed_mph: 5.0,
            ..Calibration::default()
        };
        assert!(matches!(
            cal.validate(),
            Err(CalibrationError::InvalidSpeedBounds { .. })
        ));
    }

    #[test]
    fn rejects_negative_minimum() {
        let cal = Calibration {
            min_speed_mph: -10.0,
            ..Calibration::default()
        };
        assert_eq!(
            cal.validate(),
            Err(CalibrationError::InvalidSpeedBounds {
                min: -10.0,
                max: 200.0
            })
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cal: Calibration = serde_json::from_str(r#"{"pulses_per_mile": 8000}"#).unwrap();
        assert_eq!(cal.pulses_per_mile, 8000.0);
        assert_eq!(cal.max_speed_mph, 200.0);
        assert!(cal.validate().is_ok());
    }
}
