// See config.toml for information on the variables here.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must not be negative")]
    NegativeRate(&'static str),
    #[error("{0} must be positive when its rate is non-zero")]
    ZeroBurst(&'static str),
    #[error("prefix must not be empty")]
    EmptyPrefix,
    #[error("at least one nick must be configured")]
    NoNick,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub main: MainConfig,
    pub logging: LoggingConfig,
}

/// Limits for one throttle scope. A `rate` of zero disables throttling for that scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleLimits {
    pub burst: u32,
    /// Seconds per recovered unit.
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Nicks to try, in order.
    pub nick: Vec<String>,
    pub prefix: String,
    pub channels: Vec<String>,
    pub burst: u32,
    pub rate: f64,
    pub channel_burst: u32,
    pub channel_rate: f64,
    pub user_burst: u32,
    pub user_rate: f64,
    pub wrap_length: usize,
    pub wrap_indent: String,
    /// Nick that receives a notice whenever a command fails internally.
    pub notify: Option<String>,
    /// Capacity of the pattern lookup cache. Zero disables it.
    pub cache_size: u64,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            nick: vec!["ircbot".to_owned()],
            prefix: "!".to_owned(),
            channels: vec![],
            burst: 5,
            rate: 0.5,
            channel_burst: 0,
            channel_rate: 0.0,
            user_burst: 3,
            user_rate: 1.0,
            wrap_length: 400,
            wrap_indent: "...".to_owned(),
            notify: None,
            cache_size: 256,
        }
    }
}

impl MainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.nick.is_empty() {
            return Err(ConfigError::NoNick);
        }

        for (name, limits) in [
            ("rate", self.global_limits()),
            ("channel_rate", self.channel_limits()),
            ("user_rate", self.user_limits()),
        ] {
            if limits.rate < 0.0 {
                return Err(ConfigError::NegativeRate(name));
            }
            if limits.rate > 0.0 && limits.burst == 0 {
                return Err(ConfigError::ZeroBurst(name));
            }
        }

        Ok(())
    }

    pub fn global_limits(&self) -> ThrottleLimits {
        ThrottleLimits { burst: self.burst, rate: self.rate }
    }

    pub fn channel_limits(&self) -> ThrottleLimits {
        ThrottleLimits { burst: self.channel_burst, rate: self.channel_rate }
    }

    pub fn user_limits(&self) -> ThrottleLimits {
        ThrottleLimits { burst: self.user_burst, rate: self.user_rate }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_owned() }
    }
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.main.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = BotConfig::from_str("").unwrap();
        assert_eq!(config.main.prefix, "!");
        assert_eq!(config.main.global_limits(), ThrottleLimits { burst: 5, rate: 0.5 });
        assert_eq!(config.main.channel_limits().rate, 0.0);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = BotConfig::from_str(
            r##"
            [main]
            prefix = "@"
            channels = ["#rust"]
            user_burst = 2
            "##,
        )
        .unwrap();
        assert_eq!(config.main.prefix, "@");
        assert_eq!(config.main.channels, vec!["#rust".to_owned()]);
        assert_eq!(config.main.user_limits(), ThrottleLimits { burst: 2, rate: 1.0 });
        assert_eq!(config.main.wrap_length, 400);
    }

    #[test]
    fn rejects_negative_rate() {
        let mut main = MainConfig::default();
        main.user_rate = -1.0;
        assert_eq!(main.validate(), Err(ConfigError::NegativeRate("user_rate")));
    }

    #[test]
    fn rejects_zero_burst_with_rate() {
        let mut main = MainConfig::default();
        main.channel_rate = 2.0;
        assert_eq!(main.validate(), Err(ConfigError::ZeroBurst("channel_rate")));
    }

    #[test]
    fn rejects_empty_prefix() {
        assert!(BotConfig::from_str("[main]\nprefix = \"\"").is_err());
    }

    #[test]
    fn rejects_unparseable_document() {
        assert!(BotConfig::from_str("[main\n").is_err());
    }
}
