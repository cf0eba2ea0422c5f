//! Provider capability model, adaptations, circuit breaking, health
//! tracking and registry/dispatch.

pub mod adapters;
pub mod capability;
pub mod circuit_breaker;
pub mod health;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod strategies;

pub use adapters::{ApiStyle, HostedHttpProvider, LocalProvider, ProviderWrapper};
pub use capability::{Feature, LatencyClass, Pricing, ProviderCapabilities, ProviderId};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use health::{HealthMonitorConfig, HealthStatus, HealthTracker};
pub use provider::Provider;
pub use registry::{ProviderRegistry, SelectionStrategy};
pub use retry::{run_with_retry, RetryConfig};
