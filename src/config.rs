//! Runner configuration
//!
//! Optional JSON file passed with `--config`. Every field has a default, so a
//! partial file (or none at all) is valid. CLI flags override file values.

use crate::executor::RunOptions;
use crate::loader::LoadOptions;
use crate::step_state::DEFAULT_MAX_RETRIES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upper bound on configured retries
pub const MAX_RETRIES_LIMIT: u32 = 100;

/// Runner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Retries per step before the recipe aborts
    pub max_retries: u32,
    /// Upgrade older recipe schemas on load and save them back
    pub auto_upgrade: bool,
    /// Keep a `.backup` copy of a recipe before upgrading it in place
    pub create_backup: bool,
    /// Wait for Enter between steps
    pub pause_between_steps: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            auto_upgrade: true,
            create_backup: true,
            pause_between_steps: true,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            anyhow::bail!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT,
                self.max_retries
            );
        }
        if self.create_backup && !self.auto_upgrade {
            tracing::debug!("create_backup has no effect while auto_upgrade is off");
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            auto_upgrade: self.auto_upgrade,
            create_backup: self.create_backup,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_retries: self.max_retries,
            pause_between_steps: self.pause_between_steps,
        }
    }
}
