//! Logging setup.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// setting `ECO_LOG_JSON` switches to one JSON object per line.
pub fn init_telemetry() -> Result<()> {
    let json = std::env::var_os("ECO_LOG_JSON").is_some();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eco_server=debug,eco_world=debug".into()),
        )
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().with_target(true)))
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
