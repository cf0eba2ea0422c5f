//! Protocol metrics aggregation, alert rules and system resource sampling.

pub mod alerts;
pub mod metrics;
pub mod resources;

pub use alerts::{Alert, AlertFilter, AlertManager, AlertMetric, AlertRule, Comparison, Severity};
pub use metrics::{MetricsStore, ProtocolMetrics};
pub use resources::{ResourceSampler, ResourceSnapshot};
