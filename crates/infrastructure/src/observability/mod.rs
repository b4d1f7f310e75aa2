pub mod metrics_collector;
pub mod structured_logger;
pub mod telemetry;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
pub use telemetry::init_metrics;
