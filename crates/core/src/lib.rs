//! Domain model, error taxonomy and ambient stack shared by every other crate
//! in the ensemble orchestrator: `LLMRequest`/`LLMResponse`, the `AppError`
//! taxonomy, runtime configuration and tracing setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod request;
pub mod response;

pub use config::RuntimeConfig;
pub use error::AppError;
pub use logging::{init_tracing, LogFormat};
pub use request::{ChatMessage, EnsembleConfig, LlmRequest, Role, SamplingParams};
pub use response::{FinishReason, LlmResponse};

pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

/// Result type for public operations across the workspace.
pub type AppResult<T> = Result<T, AppError>;
