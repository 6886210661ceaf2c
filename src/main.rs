//! CLI entry point for the emotion-study analysis pipeline

use clap::Parser;
use tracing_subscriber::EnvFilter;
use valence::io::cli::Cli;
use valence::pipeline::PipelineRunner;

fn main() -> valence::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let quiet = cli.quiet;
    let runner = PipelineRunner::new(cli.into_config(), quiet);
    runner.run()?;
    Ok(())
}
