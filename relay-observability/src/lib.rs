pub mod access_log;
pub mod logging;

#[cfg(feature = "prometheus")]
pub mod metrics;

pub use access_log::AccessLogExporter;
pub use logging::init_tracing;

#[cfg(feature = "prometheus")]
pub use metrics::MetricsCollector;
