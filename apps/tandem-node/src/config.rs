//! Node configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Node configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Base URL of the party API.
    /// Override: `TANDEM_STORE_URL`
    pub store_url: String,

    /// Base URL of the streaming API.
    /// Override: `TANDEM_CONTENT_URL`
    pub content_url: String,

    /// Seconds between host pushes.
    /// Override: `TANDEM_PUSH_INTERVAL`
    pub push_interval_secs: u64,

    /// Seconds between guest pulls.
    /// Override: `TANDEM_PULL_INTERVAL`
    pub pull_interval_secs: u64,

    /// Start hosted sessions in endless mode.
    /// Override: `TANDEM_AUTO_CONTINUE`
    pub auto_continue: bool,

    /// Related tracks requested per prefetch.
    pub related_limit: usize,

    /// Serve the party API from this process.
    /// Override: `TANDEM_SERVE`
    pub serve: bool,

    /// Port the relay binds to when `serve` is set.
    /// Override: `TANDEM_RELAY_PORT`
    pub relay_port: u16,

    /// Directory for the replay snapshot.
    /// Override: `TANDEM_DATA_DIR`
    pub data_dir: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let core = tandem_core::Config::default();
        Self {
            store_url: core.store_url,
            content_url: core.content_url,
            push_interval_secs: core.push_interval_secs,
            pull_interval_secs: core.pull_interval_secs,
            auto_continue: core.auto_continue,
            related_limit: core.related_limit,
            serve: false,
            relay_port: 8090,
            data_dir: None,
        }
    }
}

impl NodeConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `TANDEM_*` overrides; unparsable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        if let Some(url) = lookup("TANDEM_STORE_URL") {
            self.store_url = url;
        }
        if let Some(url) = lookup("TANDEM_CONTENT_URL") {
            self.content_url = url;
        }
        if let Some(secs) = parse(&lookup, "TANDEM_PUSH_INTERVAL") {
            self.push_interval_secs = secs;
        }
        if let Some(secs) = parse(&lookup, "TANDEM_PULL_INTERVAL") {
            self.pull_interval_secs = secs;
        }
        if let Some(enabled) = parse(&lookup, "TANDEM_AUTO_CONTINUE") {
            self.auto_continue = enabled;
        }
        if let Some(serve) = parse(&lookup, "TANDEM_SERVE") {
            self.serve = serve;
        }
        if let Some(port) = parse(&lookup, "TANDEM_RELAY_PORT") {
            self.relay_port = port;
        }

        // Note: TANDEM_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to tandem-core's Config type.
    pub fn to_core_config(&self) -> tandem_core::Config {
        tandem_core::Config {
            store_url: self.store_url.clone(),
            content_url: self.content_url.clone(),
            push_interval_secs: self.push_interval_secs,
            pull_interval_secs: self.pull_interval_secs,
            auto_continue: self.auto_continue,
            related_limit: self.related_limit,
            data_dir: self.data_dir.clone(),
            ..Default::default()
        }
    }
}
