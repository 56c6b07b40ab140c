//! Signal Hub Server
//!
//! Presence and call-signaling relay for mobile controller and robot
//! devices. Serves the WebSocket signaling channel and the one-shot HTTP
//! call-initiation endpoint from a single listener.

use clap::{Arg, Command};
use signal_hub::core::AppState;
use signal_hub::{api, system, Config, Result};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("signal-hub")
        .version(signal_hub::VERSION)
        .about("Presence and call-signaling relay.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("http-addr")
                .long("http-addr")
                .value_name("ADDR")
                .help("HTTP + WebSocket server bind address"),
        )
        .arg(
            Arg::new("ring-timeout")
                .long("ring-timeout")
                .value_name("SECS")
                .help("Seconds a call may ring before it is declared missed"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .get_matches();

    // Load configuration
    let mut config = if let Some(config_path) = matches.get_one::<String>("config") {
        Config::from_file(config_path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    apply_cli_overrides(&mut config, &matches)?;
    config.validate()?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    info!("Starting Signal Hub v{}", env!("CARGO_PKG_VERSION"));

    // Initialize metrics registry
    system::metrics::init_registry();

    // Build shared state and serve until shutdown
    let addr = config.server.http_addr;
    let state = AppState::new(config);

    api::start_server(addr, state)
        .await
        .map_err(|e| signal_hub::Error::internal(format!("HTTP server failed: {}", e)))?;

    info!("Shutdown complete");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &clap::ArgMatches) -> Result<()> {
    if let Some(addr) = matches.get_one::<String>("http-addr") {
        config.server.http_addr = addr
            .parse()
            .map_err(|e| signal_hub::Error::config(format!("Invalid HTTP address: {}", e)))?;
    }

    if let Some(secs) = matches.get_one::<String>("ring-timeout") {
        config.signaling.ring_timeout_secs = secs
            .parse()
            .map_err(|e| signal_hub::Error::config(format!("Invalid ring timeout: {}", e)))?;
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    Ok(())
}
