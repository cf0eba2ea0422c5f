use thiserror::Error;

/// Crate-wide error taxonomy. Every public async operation in the workspace
/// returns `Result<_, AppError>`; internal helpers that never cross a public
/// boundary may still use `anyhow::Result`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid request: {field}: {reason}")]
    InvalidRequest { field: String, reason: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("no providers available")]
    NoProvidersAvailable,

    #[error("all providers unavailable")]
    AllUnavailable,

    #[error("quorum not met: needed {needed}, got {got}")]
    QuorumNotMet { needed: usize, got: usize },

    #[error("ensemble timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("provider {provider} failed transiently: {message}")]
    ProviderTransient { provider: String, message: String },

    #[error("provider {provider} failed fatally: {message}")]
    ProviderFatal { provider: String, message: String },

    #[error("circuit open for provider {provider}")]
    CircuitOpen { provider: String },

    #[error("all providers in the failover chain failed")]
    AllFailed,

    #[error("duplicate provider id: {0}")]
    DuplicateProvider(String),

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("protocol not registered: {0}")]
    ProtocolNotRegistered(String),

    #[error("duplicate protocol registration: {0}")]
    DuplicateProtocol(String),

    #[error("persistence failure (request still served): {0}")]
    PersistenceFailure(String),

    #[error("audit log entry {id} is tampered")]
    AuditTamper { id: String },

    #[error("duplicate debate id: {0}")]
    DuplicateDebate(String),

    #[error("debate {id} is already completed")]
    DebateAlreadyCompleted { id: String },

    #[error("debate {id} reached max recovery attempts")]
    DebateMaxRecoveryAttempts { id: String },

    #[error("debate recovery is not configured")]
    DebateRecoveryNotConfigured,

    #[error("security violation: {0}")]
    SecurityViolation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Maps each taxonomy member onto the HTTP status code named in §7 of the
    /// design. Kept here, next to the variants, so the two stay in sync.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidRequest { .. } => 400,
            AppError::RateLimitExceeded { .. } => 429,
            AppError::NoProvidersAvailable
            | AppError::AllUnavailable
            | AppError::QuorumNotMet { .. }
            | AppError::AllFailed => 503,
            AppError::Timeout { .. } => 504,
            AppError::Configuration(_) | AppError::Serialization(_) | AppError::Io(_) => 500,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_maps_to_400() {
        let err = AppError::InvalidRequest { field: "prompt".into(), reason: "empty".into() };
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn quorum_not_met_maps_to_503() {
        let err = AppError::QuorumNotMet { needed: 2, got: 0 };
        assert_eq!(err.status_code(), 503);
    }
}
