pub mod gpio;
pub mod link;
pub mod metrics;
pub mod stream;

pub use gpio::{GpioConfig, OutputError, SysfsGpio};
pub use link::{bind_link, run_link, LinkConfig, LinkError};
pub use metrics::{init_metrics, output_healthy, record_feed, record_output_health, serve_metrics};
pub use stream::run_stream;
