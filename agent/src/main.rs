//! Node agent - converges installed jobs and packages to a desired apply spec

use clap::Parser;
use tracing_subscriber::EnvFilter;

use node_agent::cli::Cli;
use node_agent::domain::short_message;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", short_message(&e));
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.run(config).await {
        tracing::debug!(error = format!("{e:#}"), "command failed");
        eprintln!("Error: {}", short_message(&e));
        std::process::exit(1);
    }
}
