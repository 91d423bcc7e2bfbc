pub mod calibration;
pub mod extract;
mod framing_proptest;
pub mod framer;
pub mod hal;
#[cfg(feature = "simulation")]
pub mod hal_sim;
pub mod pulse_loop;
pub mod receiver;
pub mod scheduler;
pub mod sync;
pub mod tags;
pub mod timebase;

pub use calibration::{Calibration, CalibrationError, SpeedSample};
pub use extract::extract_speed;
pub use framer::{FramerStats, LineFramer, DEFAULT_LINE_CAPACITY};
pub use hal::{OutputLevel, PulseOutput};
#[cfg(feature = "simulation")]
pub use hal_sim::{EdgeLog, SimulatedOutput};
pub use pulse_loop::{PulseConfig, PulseStats, PulseThread};
pub use receiver::{FeedSummary, LinkEvent, SpeedReceiver};
pub use scheduler::{IdleReason, PulsePhase, PulseScheduler, PulseTiming, TimingError, WakeOutcome};
pub use sync::{SpeedExchange, SpeedRecord, WaitOutcome};
pub use timebase::TimeBase;
