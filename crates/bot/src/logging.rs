use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Installs the global subscriber. `RUST_LOG` filters as usual (default
/// `info`); `RUST_LOG_MODE=json` switches to line-delimited JSON for log
/// shippers, anything else stays human-readable.
pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("RUST_LOG_MODE").is_ok_and(|mode| mode == "json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_thread_names(true),
            )
            .init();
    }
}
