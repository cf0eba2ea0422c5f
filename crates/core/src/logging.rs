use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output shape for the process's tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local runs.
    Pretty,
    /// One JSON object per line, for production log shipping.
    Json,
}

/// Installs the global tracing subscriber. Call once, at process start.
/// The filter defaults to `info` and honors `RUST_LOG` if set.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            let _ = registry.with(fmt::layer().with_target(true)).try_init();
        }
        LogFormat::Json => {
            let _ = registry
                .with(fmt::layer().json().with_current_span(false).with_target(true))
                .try_init();
        }
    }
}
