//! Core configuration types.
//!
//! [`Config`] holds every tunable of the session engine. The node binary
//! builds one from YAML, environment and flags; library users can start from
//! [`Config::default`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_FATAL_SKIP_DELAY_MS, DEFAULT_PULL_INTERVAL_SECS, DEFAULT_PUSH_INTERVAL_SECS,
    DEFAULT_RELATED_LIMIT, DEFAULT_TRICKLE_BATCH, DEFAULT_TRICKLE_LOW_WATER,
    DEFAULT_TRICKLE_PROGRESS, DEFAULT_WARMUP_COUNT, EVENT_CHANNEL_CAPACITY, HTTP_TIMEOUT_SECS,
    WARMUP_PRIORITY,
};

/// Configuration for a Tandem participant.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Sync
    /// Interval between host state pushes (seconds).
    pub push_interval_secs: u64,

    /// Interval between guest state pulls (seconds).
    pub pull_interval_secs: u64,

    /// Base URL of the party API (session store).
    pub store_url: String,

    // Content
    /// Base URL of the streaming API (related tracks, warm-up, streams).
    pub content_url: String,

    /// Timeout for store and content HTTP requests (seconds).
    pub http_timeout_secs: u64,

    // Continuation
    /// Start sessions with auto-continue (endless mode) enabled.
    pub auto_continue: bool,

    /// Related candidates requested per prefetch.
    pub related_limit: usize,

    /// Progress fraction (0, 1] after which trickle may fire.
    pub trickle_progress: f64,

    /// Trickle fires when fewer than this many tracks follow the current one.
    pub trickle_low_water: usize,

    /// Maximum tracks moved from the reserve per trickle.
    pub trickle_batch: usize,

    /// Reserve tracks warmed up after each queue change.
    pub warmup_count: usize,

    /// Warm-up priority sent to the content service (1-3).
    pub warmup_priority: u8,

    // Playback
    /// Delay before skipping a track that failed fatally (milliseconds).
    pub fatal_skip_delay_ms: u64,

    // Events
    /// Capacity of the session event broadcast channel.
    pub event_channel_capacity: usize,

    // Persistence
    /// Directory for the replay snapshot. Replay is disabled when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            push_interval_secs: DEFAULT_PUSH_INTERVAL_SECS,
            pull_interval_secs: DEFAULT_PULL_INTERVAL_SECS,
            store_url: "http://127.0.0.1:8000".to_string(),
            content_url: "http://127.0.0.1:8000".to_string(),
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            auto_continue: true,
            related_limit: DEFAULT_RELATED_LIMIT,
            trickle_progress: DEFAULT_TRICKLE_PROGRESS,
            trickle_low_water: DEFAULT_TRICKLE_LOW_WATER,
            trickle_batch: DEFAULT_TRICKLE_BATCH,
            warmup_count: DEFAULT_WARMUP_COUNT,
            warmup_priority: WARMUP_PRIORITY,
            fatal_skip_delay_ms: DEFAULT_FATAL_SKIP_DELAY_MS,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            data_dir: None,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.push_interval_secs == 0 {
            return Err("push_interval_secs must be >= 1".to_string());
        }
        if self.pull_interval_secs == 0 {
            return Err("pull_interval_secs must be >= 1".to_string());
        }
        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be >= 1".to_string());
        }
        if self.related_limit == 0 {
            return Err("related_limit must be >= 1".to_string());
        }
        if !(self.trickle_progress > 0.0 && self.trickle_progress <= 1.0) {
            return Err("trickle_progress must be in (0, 1]".to_string());
        }
        if self.trickle_batch == 0 {
            return Err("trickle_batch must be >= 1".to_string());
        }
        if !(1..=3).contains(&self.warmup_priority) {
            return Err("warmup_priority must be 1, 2 or 3".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        for (name, url) in [("store_url", &self.store_url), ("content_url", &self.content_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{name} must be an http(s) URL, got '{url}'"));
            }
        }
        Ok(())
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs)
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::from_secs(self.pull_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn fatal_skip_delay(&self) -> Duration {
        Duration::from_millis(self.fatal_skip_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.push_interval(), Duration::from_secs(5));
        assert_eq!(config.pull_interval(), Duration::from_secs(3));
        assert_eq!(config.fatal_skip_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn config_rejects_zero_intervals() {
        let config = Config {
            push_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            pull_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_out_of_range_trickle_progress() {
        for progress in [0.0, 1.5, f64::NAN] {
            let config = Config {
                trickle_progress: progress,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "accepted {progress}");
        }
    }

    #[test]
    fn config_rejects_non_http_urls() {
        let config = Config {
            store_url: "ftp://relay".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"auto_continue": false}"#).unwrap();
        assert!(!config.auto_continue);
        assert_eq!(config.related_limit, 25);
    }
}
