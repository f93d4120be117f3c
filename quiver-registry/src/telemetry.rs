//! Tracing subscriber setup for Quiver binaries

use quiver_core::{ConfigError, QuiverError, QuiverResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "quiver=info,warn";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the filter. `QUIVER_LOG_FORMAT=json` switches the fmt
/// layer to JSON lines.
pub fn init_tracing() -> QuiverResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("QUIVER_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| {
        QuiverError::Config(ConfigError::InvalidValue {
            field: "tracing".to_string(),
            value: DEFAULT_LOG_FILTER.to_string(),
            reason: format!("Failed to init subscriber: {}", e),
        })
    })
}
