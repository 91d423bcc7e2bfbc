//! Pulse scheduling state machine.
//!
//! The scheduler never touches a timer or a pin. [`PulseScheduler::on_update`]
//! and [`PulseScheduler::on_wake`] take the current [`SpeedRecord`] and return
//! what to do next: which level to command and when (if ever) to wake again.
//! The pulse thread turns those answers into real waits and pin writes.

use crate::hal::OutputLevel;
use crate::sync::SpeedRecord;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimingError {
    #[error("activity threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),
    #[error("frequency floor must be finite and positive, got {0}")]
    InvalidFloor(f64),
    #[error("half-period bounds must satisfy 0 < min <= max, got [{min:?}, {max:?}]")]
    InvalidHalfPeriod { min: Duration, max: Duration },
    #[error("stale timeout must be positive")]
    ZeroStaleTimeout,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PulseTiming {
    /// At or below this frequency the output idles.
    pub active_threshold_hz: f64,
    /// Lowest frequency used when computing a half-period.
    pub floor_hz: f64,
    pub min_half_period: Duration,
    pub max_half_period: Duration,
    /// Age after which the last update no longer counts.
    pub stale_timeout: Duration,
    /// Delay before re-evaluating after an update.
    pub bootstrap_delay: Duration,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            active_threshold_hz: 0.1,
            floor_hz: 0.1,
            min_half_period: Duration::from_micros(200),
            max_half_period: Duration::from_micros(500_000),
            stale_timeout: Duration::from_millis(1500),
            bootstrap_delay: Duration::from_millis(1),
        }
    }
}

impl PulseTiming {
    pub fn validate(&self) -> Result<(), TimingError> {
        if !self.active_threshold_hz.is_finite() || self.active_threshold_hz < 0.0 {
            return Err(TimingError::InvalidThreshold(self.active_threshold_hz));
        }
        if !self.floor_hz.is_finite() || self.floor_hz <= 0.0 {
            return Err(TimingError::InvalidFloor(self.floor_hz));
        }
        if self.min_half_period.is_zero() || self.min_half_period > self.max_half_period {
            return Err(TimingError::InvalidHalfPeriod {
                min: self.min_half_period,
                max: self.max_half_period,
            });
        }
        if self.stale_timeout.is_zero() {
            return Err(TimingError::ZeroStaleTimeout);
        }
        Ok(())
    }

    /// Time between toggles for `hz`: `1 s / (2 * max(hz, floor))`, clamped.
    pub fn half_period(&self, hz: f64) -> Duration {
        let hz = hz.max(self.floor_hz);
        let half_us = (1_000_000.0 / (2.0 * hz)) as u64;
        let min_us = self.min_half_period.as_micros() as u64;
        let max_us = self.max_half_period.as_micros() as u64;
        Duration::from_micros(half_us.clamp(min_us, max_us))
    }

    pub fn is_stale(&self, record: &SpeedRecord, now_us: u64) -> bool {
        let age_us = now_us.saturating_sub(record.last_update_us);
        age_us > self.stale_timeout.as_micros() as u64
    }

    pub fn is_active(&self, record: &SpeedRecord) -> bool {
        record.target_hz > self.active_threshold_hz
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PulsePhase {
    /// Output released, nothing scheduled.
    #[default]
    Idle,
    /// Output toggling, a wake is always pending.
    Pulsing { level: OutputLevel },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    Stale,
    BelowThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// Drive `level` and wake again at `wake_at_us`.
    Toggle { level: OutputLevel, wake_at_us: u64 },
    Idle { reason: IdleReason },
}

impl WakeOutcome {
    pub fn level(&self) -> OutputLevel {
        match self {
            Self::Toggle { level, .. } => *level,
            Self::Idle { .. } => OutputLevel::Released,
        }
    }

    pub fn wake_at_us(&self) -> Option<u64> {
        match self {
            Self::Toggle { wake_at_us, .. } => Some(*wake_at_us),
            Self::Idle { .. } => None,
        }
    }
}

/// All times are [`TimeBase`](crate::timebase::TimeBase) microsecond stamps.
/// The scheduler holds the one pending wake; callers arm exactly what it
/// returns and replace whatever they had armed before.
#[derive(Debug, Clone)]
pub struct PulseScheduler {
    timing: PulseTiming,
    phase: PulsePhase,
    pending_us: Option<u64>,
    last_edge_us: u64,
}

impl PulseScheduler {
    pub fn new(timing: PulseTiming) -> Self {
        Self {
            timing,
            phase: PulsePhase::Idle,
            pending_us: None,
            last_edge_us: 0,
        }
    }

    pub fn phase(&self) -> PulsePhase {
        self.phase
    }

    /// A new record was published at `now_us`. Returns the wake to arm, if any.
    ///
    /// From idle, an active rate starts pulsing after the bootstrap delay.
    /// While pulsing the current level is kept: the next edge moves to
    /// `last_edge + half_period(new rate)`, no sooner than the bootstrap
    /// delay, and a rate at or below the threshold is re-checked after the
    /// bootstrap delay. A wake already due within the bootstrap delay is never
    /// pushed back, so a rapid stream of updates cannot starve the output.
    pub fn on_update(&mut self, record: &SpeedRecord, now_us: u64) -> Option<u64> {
        let floor_us = now_us + self.timing.bootstrap_delay.as_micros() as u64;
        let active = self.timing.is_active(record);

        let wake_us = match self.phase {
            PulsePhase::Idle if active => {
                self.phase = PulsePhase::Pulsing {
                    level: OutputLevel::Released,
                };
                floor_us
            }
            PulsePhase::Idle => return None,
            PulsePhase::Pulsing { .. } => match self.pending_us {
                Some(pending) if pending <= floor_us => pending,
                _ if active => {
                    let half = self.timing.half_period(record.target_hz).as_micros() as u64;
                    (self.last_edge_us + half).max(floor_us)
                }
                _ => floor_us,
            },
        };

        self.pending_us = Some(wake_us);
        Some(wake_us)
    }

    /// The pending wake fired at `now_us`.
    pub fn on_wake(&mut self, record: &SpeedRecord, now_us: u64) -> WakeOutcome {
        let reason = if self.timing.is_stale(record, now_us) {
            Some(IdleReason::Stale)
        } else if !self.timing.is_active(record) {
            Some(IdleReason::BelowThreshold)
        } else {
            None
        };

        if let Some(reason) = reason {
            self.phase = PulsePhase::Idle;
            self.pending_us = None;
            return WakeOutcome::Idle { reason };
        }

        let current = match self.phase {
            PulsePhase::Pulsing { level } => level,
            PulsePhase::Idle => OutputLevel::Released,
        };
        let level = current.toggled();
        self.phase = PulsePhase::Pulsing { level };

        // Cadence is anchored to the scheduled edge, not to wake-up jitter,
        // unless a whole half-period has already been lost.
        let edge_us = self
            .pending_us
            .filter(|&pending| pending <= now_us)
            .unwrap_or(now_us);
        let half = self.timing.half_period(record.target_hz).as_micros() as u64;
        let mut wake_at_us = edge_us + half;
        if wake_at_us <= now_us {
            wake_at_us = now_us + half;
        }
        self.last_edge_us = edge_us;
        self.pending_us = Some(wake_at_us);

        WakeOutcome::Toggle { level, wake_at_us }
    }
}

impl Default for PulseScheduler {
    fn default() -> Self {
        Self::new(PulseTiming::default())
    }
}
