use anyhow::Result;
use clap::Parser;
use gram_indexer::{run, Cli};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<ExitCode> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let outcome = run(Cli::parse())?;
    Ok(ExitCode::from(outcome.exit_status()))
}
