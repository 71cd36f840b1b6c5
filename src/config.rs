use crate::{normalize_url, pool::QueryPolicy, PoolOptions};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use thiserror::Error;
use url::Url;

pub const DEFAULT_NAMESPACE: &str = "thunderproof";

pub const DEFAULT_RELAYS: [&str; 5] = [
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.snort.social",
    "wss://relay.current.fyi",
    "wss://brb.io",
];

const MAX_CONFIG_FILE_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// everything the resolver and the repository need to know about their environment.
///
/// built once, wrapped in an `Arc` and handed to each component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub relays: Vec<String>,
    pub profile_timeout_ms: u64,
    pub review_timeout_ms: u64,
    pub publish_timeout_ms: u64,
    pub review_limit: usize,
    pub namespace: String,
    pub profile_policy: QueryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            profile_timeout_ms: 10_000,
            review_timeout_ms: 10_000,
            publish_timeout_ms: 10_000,
            review_limit: 50,
            namespace: DEFAULT_NAMESPACE.to_string(),
            profile_policy: QueryPolicy::AllOrTimeout,
        }
    }
}

impl Config {
    /// read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid(
                "config file exceeds size limit".to_string(),
            ));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::Invalid("at least one relay is required".into()));
        }
        for relay in &self.relays {
            let url = normalize_url(relay)
                .map_err(|err| ConfigError::Invalid(format!("relay '{}': {}", relay, err)))?;
            if !crate::helpers::is_valid_relay_url(url.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "relay '{}' is not a websocket url",
                    relay
                )));
            }
        }

        for (name, value) in [
            ("profile_timeout_ms", self.profile_timeout_ms),
            ("review_timeout_ms", self.review_timeout_ms),
            ("publish_timeout_ms", self.publish_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }

        if self.review_limit == 0 {
            return Err(ConfigError::Invalid("review_limit must be at least 1".into()));
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".into()));
        }
        Ok(())
    }

    /// normalized relay urls, anything that doesn't normalize is skipped
    pub fn relay_urls(&self) -> Vec<Url> {
        let mut urls: Vec<Url> = Vec::with_capacity(self.relays.len());
        for relay in &self.relays {
            match normalize_url(relay) {
                Ok(url) if !urls.contains(&url) => urls.push(url),
                Ok(_) => {}
                Err(err) => log::warn!("skipping relay '{}': {}", relay, err),
            }
        }
        urls
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_timeout_ms)
    }

    pub fn review_timeout(&self) -> Duration {
        Duration::from_millis(self.review_timeout_ms)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            publish_timeout: Duration::from_millis(self.publish_timeout_ms),
        }
    }
}
