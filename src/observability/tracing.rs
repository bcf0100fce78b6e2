use crate::config::ObservabilityConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging. `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().flatten_event(true).with_current_span(true))
                .init();
        }
        _ => {
            registry.with(fmt::layer().pretty().with_target(false)).init();
        }
    }

    tracing::info!(
        level = %config.log_level,
        format = %config.log_format,
        metrics = config.metrics_enabled,
        "Tracing initialized"
    );
}
