use crate::hal::{OutputLevel, PulseOutput};
use crate::scheduler::{PulsePhase, PulseScheduler, PulseTiming, WakeOutcome};
use crate::sync::{SpeedExchange, WaitOutcome};
use crate::timebase::TimeBase;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct PulseConfig {
    pub timing: PulseTiming,
    /// Final stretch before a deadline that is spun instead of slept.
    pub spin_margin: Duration,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            timing: PulseTiming::default(),
            spin_margin: Duration::from_micros(50),
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct PulseStats {
    pub edges: u64,
    pub wakes: u64,
    pub idles: u64,
    pub updates: u64,
    pub max_lateness_us: u64,
}

/// The timer context. Owns the scheduler and the output and keeps exactly one
/// pending deadline, so re-arming can never double-fire or lose a wake.
pub struct PulseThread<O: PulseOutput> {
    output: O,
    config: PulseConfig,
    exchange: Arc<SpeedExchange>,
    scheduler: PulseScheduler,
    stats: PulseStats,
    timebase: TimeBase,
    level: OutputLevel,
    seen_generation: u64,
}

impl<O: PulseOutput> PulseThread<O> {
    pub fn new(
        output: O,
        config: PulseConfig,
        exchange: Arc<SpeedExchange>,
        timebase: TimeBase,
    ) -> Self {
        let scheduler = PulseScheduler::new(config.timing.clone());
        Self {
            output,
            config,
            exchange,
            scheduler,
            stats: PulseStats::default(),
            timebase,
            level: OutputLevel::Released,
            seen_generation: 0,
        }
    }

    /// Runs until [`SpeedExchange::shutdown`] is called. The output is left
    /// released on return.
    pub fn run(&mut self) {
        self.drive(OutputLevel::Released);
        let mut deadline: Option<Instant> = None;

        loop {
            let wait_until =
                deadline.map(|due| due.checked_sub(self.config.spin_margin).unwrap_or(due));

            match self.exchange.wait_change(self.seen_generation, wait_until) {
                WaitOutcome::Shutdown => break,
                WaitOutcome::Updated(record) => {
                    self.seen_generation = record.generation;
                    self.stats.updates += 1;
                    let now_us = self.timebase.now_us();
                    if let Some(at_us) = self.scheduler.on_update(&record, now_us) {
                        deadline = Some(self.timebase.instant_at(at_us));
                    }
                }
                WaitOutcome::DeadlineReached(_) => {
                    let Some(due) = deadline else {
                        continue;
                    };
                    while Instant::now() < due {
                        std::hint::spin_loop();
                    }
                    deadline = self.fire(due);
                }
            }
        }

        self.drive(OutputLevel::Released);
    }

    fn fire(&mut self, due: Instant) -> Option<Instant> {
        let fired_at = Instant::now();
        let lateness_us = fired_at.saturating_duration_since(due).as_micros() as u64;
        self.stats.max_lateness_us = self.stats.max_lateness_us.max(lateness_us);
        self.stats.wakes += 1;

        let record = self.exchange.snapshot();
        let outcome = self.scheduler.on_wake(&record, self.timebase.now_us());
        self.drive(outcome.level());

        if let WakeOutcome::Idle { reason } = outcome {
            self.stats.idles += 1;
            log::debug!("pulse output idle ({:?})", reason);
        }
        outcome
            .wake_at_us()
            .map(|at_us| self.timebase.instant_at(at_us))
    }

    fn drive(&mut self, level: OutputLevel) {
        if level != self.level {
            self.stats.edges += 1;
        }
        self.level = level;
        self.output.set_level(level);
    }

    pub fn phase(&self) -> PulsePhase {
        self.scheduler.phase()
    }

    pub fn level(&self) -> OutputLevel {
        self.level
    }

    pub fn stats(&self) -> &PulseStats {
        &self.stats
    }
}
