//! YAML configuration: command table, prefix, timeout, reply overrides.
//!
//! A missing or malformed file never stops the bot — it degrades to an empty
//! command table and the default prefix, and keeps answering webhooks.

use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use tracing::{info, warn};

use router_core::{CommandSpec, ReplyCatalog, RouterConfig};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Command prefix character; `.` when omitted.
    pub prefix: Option<char>,
    /// AI-chat inactivity timeout; 5 minutes when omitted.
    pub ai_timeout_minutes: Option<i64>,
    /// Phone number (digits) of the bot administrator.
    pub admin_number: String,
    pub commands: Vec<CommandSpec>,
    /// Partial overrides for user-facing reply texts.
    pub replies: ReplyCatalog,
}

impl BotConfig {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            prefix: self.prefix,
            ai_timeout_minutes: self.ai_timeout_minutes,
            commands: self.commands.clone(),
        }
    }
}

/// Loads the config, falling back to degraded defaults on any failure.
pub fn load_config(path: &Path) -> BotConfig {
    match try_load(path) {
        Ok(config) => {
            info!(
                path = %path.display(),
                commands = config.commands.len(),
                "Configuration loaded"
            );
            config
        }
        Err(error) => {
            warn!(
                path = %path.display(),
                %error,
                "Failed to load config; running degraded with an empty command table"
            );
            BotConfig::default()
        }
    }
}

fn try_load(path: &Path) -> Result<BotConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    serde_yaml::from_str(&raw).context("parsing YAML config")
}
