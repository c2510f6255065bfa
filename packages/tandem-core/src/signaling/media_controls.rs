//! OS media controls integration points.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::playback::TransportState;
use crate::queue::Track;

/// A media key or transport button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKey {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    Stop,
}

/// Sink for "now playing" information shown by the OS.
///
/// Implementations must not block; they are called from the session loop.
pub trait MediaControls: Send + Sync {
    fn update_metadata(&self, track: Option<&Track>);

    fn set_playback_status(&self, state: TransportState);

    fn set_timeline(&self, position: Duration, duration: Option<Duration>);
}

/// Controls for platforms without an integration.
pub struct NoopMediaControls;

impl MediaControls for NoopMediaControls {
    fn update_metadata(&self, _track: Option<&Track>) {}

    fn set_playback_status(&self, _state: TransportState) {}

    fn set_timeline(&self, _position: Duration, _duration: Option<Duration>) {}
}

/// Controls that log every update. Used by the headless node.
pub struct LoggingMediaControls;

impl MediaControls for LoggingMediaControls {
    fn update_metadata(&self, track: Option<&Track>) {
        match track {
            Some(t) => log::info!("[MediaControls] Now playing: {} - {}", t.artist, t.title),
            None => log::info!("[MediaControls] Nothing playing"),
        }
    }

    fn set_playback_status(&self, state: TransportState) {
        log::debug!("[MediaControls] Status: {:?}", state);
    }

    fn set_timeline(&self, position: Duration, duration: Option<Duration>) {
        log::trace!(
            "[MediaControls] Timeline: {}s / {:?}s",
            position.as_secs(),
            duration.map(|d| d.as_secs())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_keys_deserialize_from_lowercase_names() {
        let key: MediaKey = serde_json::from_str("\"toggle\"").unwrap();
        assert_eq!(key, MediaKey::Toggle);
    }
}
