//! Observability for the skill demand service: logging, metrics and audit samples.

pub mod metrics;
pub mod logging;
pub mod audit;

pub use metrics::Metrics;
pub use audit::AuditLog;
pub use logging::init_logging;
