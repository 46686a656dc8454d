pub mod config;

use std::path::Path;
use std::str::FromStr;

use anyhow::Context;

use crate::config::config::BotConfig;

pub static DEFAULT_CONFIG_LOCATION: &str = "./config.toml";

/// Parses and validates a configuration from TOML text. Missing sections and keys take their
/// defaults.
impl FromStr for BotConfig {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> anyhow::Result<BotConfig> {
        let config = toml::from_str::<BotConfig>(text).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

impl BotConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<BotConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;
        text.parse()
    }
}
