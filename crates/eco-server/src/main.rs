//! HTTP server hosting a live ecosystem.

mod api;
mod telemetry;
mod ticker;

use anyhow::{Context, Result};
use eco_core::{ServerConfig, SimulationConfig};
use eco_world::Simulation;
use tokio::signal;
use tracing::info;

/// Read a JSON config from the file named by `var`, or fall back to defaults
fn load_config<T>(var: &str) -> Result<T>
where
    T: Default + serde::de::DeserializeOwned,
{
    match std::env::var_os(var) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.to_string_lossy()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", var))
        }
        None => Ok(T::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config: ServerConfig = load_config("ECO_SERVER_CONFIG")?;
    let sim_config: SimulationConfig = load_config("ECO_SIM_CONFIG")?;

    // Initialize telemetry
    telemetry::init_telemetry()?;

    info!("Starting Ecosphere server on {}:{}", config.bind_address, config.port);

    let world = Simulation::new(sim_config)?;
    let state = api::AppState::new(world, api::Clock::from(&config));

    let ticker = tokio::spawn(ticker::run_tick_loop(state.clone(), config.frame_millis));

    let app = api::router(state);

    // Start server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.abort();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
