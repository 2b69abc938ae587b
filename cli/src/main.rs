//! OCPP Station: CLI charge point
//!
//! Runs one virtual charging station against a Central System and takes
//! operator commands from stdin.
//!
//! ```sh
//! # Run with default config (~/.config/ocpp-station/config.toml)
//! ocpp-station
//!
//! # Point at another Central System with three connectors
//! ocpp-station --url ws://csms.local:9000/ocpp --station-id CP042 --connectors 3
//!
//! # Validate config without starting
//! ocpp-station --check
//! ```

mod commands;

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use ocpp_station::config::AppConfig;
use ocpp_station::runtime::{init_tracing, StationHandle};

use commands::{parse_line, Input, HELP};

/// OCPP 1.6-J charge point simulator.
#[derive(Parser, Debug)]
#[command(
    name = "ocpp-station",
    version,
    about = "OCPP 1.6-J charging station",
    long_about = "Virtual OCPP 1.6-J charging station. Connects to a Central System \
                  over WebSocket and accepts operator commands on stdin.\n\n\
                  Default config: ~/.config/ocpp-station/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "OCPP_STATION_CONFIG")]
    config: Option<PathBuf>,

    /// Override the Central System URL.
    #[arg(long)]
    url: Option<String>,

    /// Override the station id.
    #[arg(long)]
    station_id: Option<String>,

    /// Override the number of connectors.
    #[arg(long)]
    connectors: Option<u32>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration and exit without connecting.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .unwrap_or_else(ocpp_station::default_config_path);

    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);

    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    if let Some(url) = cli.url {
        info!("CLI override: url = {}", url);
        config.server.url = url;
    }
    if let Some(id) = cli.station_id {
        info!("CLI override: station_id = {}", id);
        config.station.id = id;
    }
    if let Some(connectors) = cli.connectors {
        info!("CLI override: connectors = {}", connectors);
        config.station.connectors = connectors;
    }

    config.validate()?;

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Station     : {} ({} connectors)", config.station.id, config.station.connectors);
        println!("   Central     : {}", config.server.url);
        println!("   Meter values: {}", config.meter_values.format);
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    // ── Start station ──────────────────────────────────────────
    let handle = StationHandle::start_with(config, |engine| {
        engine.set_on_error(|e| {
            if !e.is_empty() {
                warn!("Station error: {}", e);
            }
        });
    });
    handle.install_signal_handler();

    info!("🚀 Station {} started. Type `help` for commands, Ctrl+C to stop.", handle.url);

    let shutdown = handle.shutdown_signal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.wait() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            Ok(Input::Command(command)) => {
                if let Err(e) = handle.send(command) {
                    error!("{}", e);
                    break;
                }
            }
            Ok(Input::Help) => println!("{}", HELP),
            Ok(Input::Quit) => break,
            Ok(Input::Empty) => {}
            Err(e) => println!("{}", e),
        }
    }

    handle.shutdown().await;
    Ok(())
}
