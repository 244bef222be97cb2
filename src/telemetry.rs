use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`); `LOG_FORMAT=json` switches
/// to one JSON object per line.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        fmt().json().with_env_filter(filter).try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| anyhow!("Failed to initialise tracing: {}", e))
}
