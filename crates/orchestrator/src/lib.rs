//! Composition root tying request intake, provider selection, ensemble
//! fan-out and response persistence together, with every call observed by
//! the protocol monitor.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use monitor::{AlertManager, MetricsStore};
//! use orchestrator::{Orchestrator, PipelineConfig};
//! use providers::{CircuitBreakerConfig, ProviderRegistry};
//!
//! # async fn run() -> Result<(), core::AppError> {
//! let registry = Arc::new(ProviderRegistry::new(CircuitBreakerConfig::default()));
//! let metrics = Arc::new(MetricsStore::default());
//! let alerts = Arc::new(AlertManager::new());
//! let orchestrator = Orchestrator::new(registry, metrics, alerts, PipelineConfig::default());
//!
//! let request = core::LlmRequest::from_prompt("summarize this");
//! let response = orchestrator.handle_request(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod pipeline;
pub mod traits;

pub use pipeline::{Orchestrator, PipelineConfig};
pub use traits::{LogSink, RequestSource};
