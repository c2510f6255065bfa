//! Fixed constants shared by the party API and the session engine.
//!
//! Wire paths must match the session relay and the streaming service; the
//! tuning defaults seed [`crate::state::Config`] and can be overridden there.

// ─────────────────────────────────────────────────────────────────────────────
// Service Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported by the relay health endpoint.
pub const SERVICE_ID: &str = "tandem-relay";

// ─────────────────────────────────────────────────────────────────────────────
// Party API (session store)
// ─────────────────────────────────────────────────────────────────────────────

/// Path prefix of the party session API.
pub const PARTY_API_PREFIX: &str = "/api/party";

/// Path prefix of the streaming (content) API.
pub const STREAMING_API_PREFIX: &str = "/api/streaming/youtube";

/// Wire value for "no current track".
pub const NO_INDEX: i64 = -1;

// ─────────────────────────────────────────────────────────────────────────────
// Sync cadence
// ─────────────────────────────────────────────────────────────────────────────

/// Interval between host state pushes (seconds).
pub const DEFAULT_PUSH_INTERVAL_SECS: u64 = 5;

/// Interval between guest state pulls (seconds).
pub const DEFAULT_PULL_INTERVAL_SECS: u64 = 3;

/// Timeout for session store and content HTTP requests (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Queue continuation
// ─────────────────────────────────────────────────────────────────────────────

/// Related candidates requested per prefetch.
pub const DEFAULT_RELATED_LIMIT: usize = 25;

/// Fraction of the current track after which trickle may fire.
pub const DEFAULT_TRICKLE_PROGRESS: f64 = 0.30;

/// Trickle fires when fewer than this many tracks remain after the current one.
pub const DEFAULT_TRICKLE_LOW_WATER: usize = 3;

/// Maximum tracks moved from the reserve per trickle.
pub const DEFAULT_TRICKLE_BATCH: usize = 10;

/// Reserve tracks warmed up on every queue change.
pub const DEFAULT_WARMUP_COUNT: usize = 3;

/// Priority for background warm-up (1 = play now, 2 = next up, 3 = visible).
pub const WARMUP_PRIORITY: u8 = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Playback
// ─────────────────────────────────────────────────────────────────────────────

/// Delay before auto-skipping a track that failed fatally (milliseconds).
pub const DEFAULT_FATAL_SKIP_DELAY_MS: u64 = 1500;

/// Capacity of the session command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the session event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;
