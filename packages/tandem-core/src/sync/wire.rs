//! Wire types exchanged with the session store.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::NO_INDEX;
use crate::queue::Track;

/// Full session snapshot as stored and exchanged by the party API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    /// Host credential. Doubles as the host identity in the party API.
    pub host_id: String,
    #[serde(default)]
    pub queue: Vec<Track>,
    /// Index into `queue`, or `-1` for none.
    #[serde(default = "no_index")]
    pub current_index: i64,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub is_locked: bool,
    /// Unix milliseconds of the last write, or 0 when the store reported a
    /// timestamp in another form.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: u64,
}

fn no_index() -> i64 {
    NO_INDEX
}

/// Accepts Unix milliseconds or a datetime string. Strings are not
/// interpreted; nothing in the session depends on the value.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Millis(f64),
        Text(String),
    }

    Ok(match Option::<Timestamp>::deserialize(deserializer)? {
        Some(Timestamp::Millis(ms)) if ms.is_finite() && ms >= 0.0 => ms as u64,
        Some(Timestamp::Text(text)) => {
            log::debug!("[Sync] Ignoring non-numeric updated_at '{}'", text);
            0
        }
        _ => 0,
    })
}

impl SessionState {
    /// Empty state for a freshly created session.
    pub fn empty(session_id: impl Into<String>, host_id: impl Into<String>, now: u64) -> Self {
        Self {
            session_id: session_id.into(),
            host_id: host_id.into(),
            queue: Vec::new(),
            current_index: NO_INDEX,
            is_playing: false,
            is_locked: false,
            updated_at: now,
        }
    }

    /// The current index as an in-memory value, validated against the queue.
    ///
    /// Out-of-range remote values are clamped to the last entry.
    pub fn current(&self) -> Option<usize> {
        index_from_wire(self.current_index, self.queue.len())
    }
}

/// Converts an in-memory index to its wire value.
pub fn index_to_wire(index: Option<usize>) -> i64 {
    index.map_or(NO_INDEX, |i| i as i64)
}

/// Converts a wire index to an in-memory value for a queue of length `len`.
pub fn index_from_wire(index: i64, len: usize) -> Option<usize> {
    if index < 0 || len == 0 {
        return None;
    }
    Some((index as usize).min(len - 1))
}

/// Response to a successful host push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushAck {
    /// Tracks guests submitted since the previous push.
    #[serde(default)]
    pub contributions: Vec<Track>,
    /// Whether enough participants voted to skip the current track.
    #[serde(default)]
    pub skip_requested: bool,
}

/// Result of casting a skip vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub votes: usize,
    pub threshold: usize,
    pub should_skip: bool,
}

impl VoteTally {
    /// Majority of the participants seen so far, never below one.
    pub fn threshold_for(active_users: usize) -> usize {
        ((active_users + 1) / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_index_round_trips_none() {
        assert_eq!(index_to_wire(None), -1);
        assert_eq!(index_from_wire(-1, 3), None);
        assert_eq!(index_to_wire(Some(2)), 2);
    }

    #[test]
    fn wire_index_is_clamped_to_queue() {
        assert_eq!(index_from_wire(7, 3), Some(2));
        assert_eq!(index_from_wire(0, 0), None);
    }

    #[test]
    fn state_deserializes_with_missing_optional_fields() {
        let json = r#"{"session_id": "AB12CD34", "host_id": "h"}"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.current_index, -1);
        assert!(state.queue.is_empty());
        assert!(!state.is_locked);
        assert_eq!(state.current(), None);
    }

    #[test]
    fn updated_at_accepts_millis_and_datetime_strings() {
        let json = r#"{"session_id": "AB12CD34", "host_id": "h", "updated_at": 1700000000000}"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.updated_at, 1_700_000_000_000);

        let json = r#"{"session_id": "AB12CD34", "host_id": "h", "updated_at": "2026-03-01T12:00:00Z"}"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.updated_at, 0);

        let json = r#"{"session_id": "AB12CD34", "host_id": "h", "updated_at": null}"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.updated_at, 0);
    }

    #[test]
    fn vote_threshold_is_half_rounded_up() {
        assert_eq!(VoteTally::threshold_for(0), 1);
        assert_eq!(VoteTally::threshold_for(1), 1);
        assert_eq!(VoteTally::threshold_for(2), 1);
        assert_eq!(VoteTally::threshold_for(3), 2);
        assert_eq!(VoteTally::threshold_for(4), 2);
        assert_eq!(VoteTally::threshold_for(5), 3);
    }
}
