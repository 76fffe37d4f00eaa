//! Infrastructure implementation of the `ConfigStore` port.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::AgentConfig;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "NODE_AGENT_CONFIG";

/// Used when neither `--config` nor `NODE_AGENT_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/var/vcap/bosh/etc/node-agent.yml";

/// Production implementation of `ConfigStore` that reads a YAML file.
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `explicit` if given, else `NODE_AGENT_CONFIG`, else the default path.
    #[must_use]
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::new(path)
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<AgentConfig> {
        if !self.path.exists() {
            return Ok(AgentConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
