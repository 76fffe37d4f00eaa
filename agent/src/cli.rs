//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::commands;
use crate::domain::AgentConfig;
use crate::infra::config::YamlConfigStore;

/// Converge this node's jobs and packages, compile packages, drain jobs
#[derive(Parser)]
#[command(
    name = "node-agent",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Agent configuration file [default: $NODE_AGENT_CONFIG or /var/vcap/bosh/etc/node-agent.yml]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a desired-state spec to this node
    Apply(commands::apply::ApplyArgs),

    /// Compile a package against its dependencies and upload the result
    Compile(commands::compile::CompileArgs),

    /// Run a job's drain script
    Drain(commands::drain::DrainArgs),
}

impl Cli {
    /// Load the agent configuration this invocation points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_config(&self) -> Result<AgentConfig> {
        YamlConfigStore::resolve(self.config.clone()).load()
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self, config: AgentConfig) -> Result<()> {
        let app = AppContext::new(config);
        match self.command {
            Command::Apply(args) => commands::apply::run(&app, &args).await,
            Command::Compile(args) => commands::compile::run(&app, &args).await,
            Command::Drain(args) => commands::drain::run(&app, &args).await,
        }
    }
}
