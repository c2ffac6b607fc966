use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reporter::cli::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let artifacts = cli.run().inspect_err(|e| error!("{}", e))?;
    info!("Done: {}", artifacts.image.display());
    Ok(())
}
