//! Particle ledger server binary

use anyhow::Result;
use particle_ledger::{Config, Particles};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Particle Ledger Server");

    // Load configuration
    let config = Config::from_env()?;

    // Open service
    let service = Particles::open(config)?;
    tracing::info!("Particle ledger opened successfully");

    // TODO: Start RPC server here
    // For now, just keep running
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down particle ledger server");
    service.shutdown().await?;
    Ok(())
}
