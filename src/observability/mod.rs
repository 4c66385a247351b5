pub mod metrics;
pub mod tracing;

pub use metrics::{MetricsRegistry, Operation};
pub use tracing::init_tracing;
