use crate::generator::workflow::launch;
use anyhow::Result;
use clap::Parser;

mod cache;
mod cli;
mod compendium;
mod config;
mod generator;
mod i18n;
mod llm;
mod utils;

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        "compendium_scribe=debug"
    } else {
        "compendium_scribe=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    fmt().with_env_filter(env_filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let (config, notices) = args.resolve_config()?;
    init_tracing(config.verbose);
    for notice in notices {
        tracing::warn!("{}", notice);
    }

    launch(args.job(), &config).await
}
