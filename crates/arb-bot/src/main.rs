//! Cross-exchange arbitrage bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Cross-exchange crypto arbitrage monitor and executor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ARB_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before any WS connections.
    arb_ws::init_crypto();

    let args = Args::parse();

    arb_telemetry::init_logging()?;

    info!("Starting arbitrage bot v{}", env!("CARGO_PKG_VERSION"));

    let config = arb_bot::AppConfig::load(args.config.as_deref())?;
    info!(
        exchanges = config.exchanges.len(),
        pairs = config.pairs.len(),
        auto_execute = config.arbitrage.auto_execute,
        "Configuration loaded"
    );

    let app = arb_bot::ArbitrageApp::new(config)?;
    app.run().await?;

    Ok(())
}
