//! uartbridge CLI entrypoint.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use uartbridge::bridge;
use uartbridge::{BridgeConfig, DeviceRegistry, EventBus, NativePeripheralManager};

#[derive(Parser)]
#[command(
    name = "uartbridge",
    version,
    about = "Bridge UART peripherals to a hybrid-app JavaScript runtime"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge over stdio (newline-delimited JSON).
    Serve {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List serial ports visible to the peripheral driver.
    Ports,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Stdout carries the wire protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => cmd_serve(config).await,
        Command::Ports => cmd_ports(),
    }
}

async fn cmd_serve(config_path: Option<PathBuf>) -> Result<()> {
    let config = BridgeConfig::load(config_path.as_deref()).context("loading configuration")?;

    let events = EventBus::new(config.event_capacity);
    let driver = Arc::new(NativePeripheralManager::new(&config));
    let registry = Arc::new(DeviceRegistry::new(driver, events.clone(), &config));

    info!("uartbridge serving on stdio");
    tokio::select! {
        result = bridge::stdio::run(registry.clone(), events) => {
            result.context("bridge transport failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received; tearing down");
            registry.teardown().await;
        }
    }
    Ok(())
}

fn cmd_ports() -> Result<()> {
    let ports = tokio_serial::available_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    for port in ports {
        println!("{}\t{:?}", port.port_name, port.port_type);
    }
    Ok(())
}
