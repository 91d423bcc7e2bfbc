pub mod runtime;

pub use runtime::{run, run_from_args, RuntimeConfig};
