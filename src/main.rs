// main.rs — thin entrypoint: parse CLI, load config, init telemetry, build
// the gateway (real or simulated), construct the orchestrator, run it.
mod config;
mod constraints;
mod error;
mod funding;
mod gateway;
mod metrics;
mod model;
mod normalizer;
mod oms;
mod orchestrator;
mod risk;
mod signing;
mod strategy;
mod telemetry;

use std::sync::Arc;

use clap::Parser;

use config::{Cli, EngineConfig};
use error::EngineResult;
use gateway::{Gateway, HyperliquidGateway, SimGateway};
use orchestrator::Orchestrator;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main]
async fn main() -> EngineResult<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let mut cfg = EngineConfig::load(&cli.config)?;
    cfg.dry_run = cfg.dry_run || cli.dry_run;

    if cli.validate_config {
        println!("{:#?}", cfg);
        return Ok(());
    }

    let dry_run = cfg.dry_run;

    let gw: Arc<dyn Gateway> = if dry_run {
        log::info!("starting in dry-run mode for {}", cfg.symbol);
        Arc::new(SimGateway::new(0.1, 0.001, 0.0005))
    } else {
        let address =
            std::env::var("HL_ADDRESS").map_err(|_| error::EngineError::Config("HL_ADDRESS not set".into()))?;
        let private_key = std::env::var("HL_PRIVATE_KEY")
            .map_err(|_| error::EngineError::Config("HL_PRIVATE_KEY not set".into()))?;
        Arc::new(HyperliquidGateway::new(address, private_key))
    };

    let orchestrator = Orchestrator::build(cfg, gw).await?;
    orchestrator.run().await?;
    Ok(())
}
