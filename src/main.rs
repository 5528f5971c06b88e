use anyhow::Result;
use asmcov::cli::{Cli, Command};
use asmcov::commands;
use asmcov::config::PipelineConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; progress goes to stderr
fn init_tracing(debug: bool, quiet: bool) {
    let level = if debug {
        tracing::Level::TRACE
    } else if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug, args.quiet);

    let config = PipelineConfig::load(args.config.as_deref())?;
    tracing::debug!(?config, "Pipeline configuration");

    match &args.command {
        Command::Index(index) => commands::run_index(index, &config),
        Command::Resolve(resolve) => commands::run_resolve(resolve, &config),
        Command::Coverable(coverable) => commands::run_coverable(coverable),
        Command::Covered(covered) => commands::run_covered(covered, &config),
        Command::Compare(compare) => commands::run_compare(compare),
    }
}
