use crate::hal::{OutputLevel, PulseOutput};
use crate::timebase::TimeBase;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

const EDGE_HISTORY: usize = 4096;

#[derive(Debug, Default)]
struct EdgeState {
    level: OutputLevel,
    toggles: u64,
    edges: VecDeque<(u64, OutputLevel)>,
}

/// Read side of a [`SimulatedOutput`], usable after the output has moved
/// into the pulse thread.
#[derive(Debug, Clone, Default)]
pub struct EdgeLog {
    inner: Arc<Mutex<EdgeState>>,
}

impl EdgeLog {
    pub fn level(&self) -> OutputLevel {
        self.with(|s| s.level)
    }

    /// Number of level changes seen so far.
    pub fn toggles(&self) -> u64 {
        self.with(|s| s.toggles)
    }

    /// Most recent edges as `(timestamp_us, new_level)`.
    pub fn edges(&self) -> Vec<(u64, OutputLevel)> {
        self.with(|s| s.edges.iter().copied().collect())
    }

    fn with<T>(&self, f: impl FnOnce(&EdgeState) -> T) -> T {
        f(&self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Output sink that records edges instead of driving a pin.
#[derive(Debug, Clone)]
pub struct SimulatedOutput {
    log: EdgeLog,
    timebase: TimeBase,
}

impl SimulatedOutput {
    pub fn new(timebase: TimeBase) -> Self {
        Self {
            log: EdgeLog::default(),
            timebase,
        }
    }

    pub fn log(&self) -> EdgeLog {
        self.log.clone()
    }
}

impl Default for SimulatedOutput {
    fn default() -> Self {
        Self::new(TimeBase::new())
    }
}

impl PulseOutput for SimulatedOutput {
    fn set_level(&mut self, level: OutputLevel) {
        let now = self.timebase.now_us();
        let mut state = self
            .log
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if state.level != level {
            state.level = level;
            state.toggles += 1;
            if state.edges.len() == EDGE_HISTORY {
                state.edges.pop_front();
            }
            state.edges.push_back((now, level));
        }
    }
}
