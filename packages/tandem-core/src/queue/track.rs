//! Track value types.

use serde::{Deserialize, Serialize};

use crate::utils::new_instance_id;

/// A track as returned by the content service, before it enters a queue.
///
/// Carries no queue identity; the same candidate may be queued many times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCandidate {
    /// Content identifier of the underlying media.
    #[serde(rename = "id")]
    pub external_id: String,
    #[serde(default = "unknown_title")]
    pub title: String,
    #[serde(default = "unknown_artist")]
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Duration in whole seconds, when the service knows it.
    #[serde(
        default,
        rename = "duration",
        deserialize_with = "lenient_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_secs: Option<u32>,
}

/// Accepts integral or fractional seconds; the streaming API emits both.
fn lenient_duration<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = Option::<f64>::deserialize(deserializer)?;
    Ok(secs.filter(|s| s.is_finite() && *s >= 0.0).map(|s| s.round() as u32))
}

fn unknown_title() -> String {
    "Unknown".to_string()
}

fn unknown_artist() -> String {
    "Unknown Artist".to_string()
}

impl TrackCandidate {
    /// Creates a candidate with only the required fields set.
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail_url: None,
            duration_secs: None,
        }
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Materializes the candidate as a queue entry with a fresh instance id.
    #[must_use]
    pub fn into_track(self) -> Track {
        Track {
            queue_instance_id: new_instance_id(),
            external_id: self.external_id,
            title: self.title,
            artist: self.artist,
            thumbnail_url: self.thumbnail_url,
            duration_secs: self.duration_secs,
        }
    }
}

/// An immutable queue entry.
///
/// `queue_instance_id` identifies this insertion; `external_id` identifies
/// the content. Serialized with the party API's track keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "id")]
    pub queue_instance_id: String,
    pub external_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default, rename = "thumbnail", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(
        default,
        rename = "duration",
        deserialize_with = "lenient_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_secs: Option<u32>,
}

impl Track {
    /// Strips the queue identity, e.g. to re-queue the same content.
    #[must_use]
    pub fn to_candidate(&self) -> TrackCandidate {
        TrackCandidate {
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            duration_secs: self.duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_track_assigns_fresh_instance_ids() {
        let candidate = TrackCandidate::new("abc", "Song", "Band");
        let a = candidate.clone().into_track();
        let b = candidate.into_track();
        assert_eq!(a.external_id, b.external_id);
        assert_ne!(a.queue_instance_id, b.queue_instance_id);
    }

    #[test]
    fn candidate_deserializes_related_payload() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna",
            "artist": "Rick",
            "thumbnail_url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
            "duration": 213,
            "source": "youtube"
        }"#;
        let candidate: TrackCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.external_id, "dQw4w9WgXcQ");
        assert_eq!(candidate.duration_secs, Some(213));
        assert!(candidate.thumbnail_url.is_some());
    }

    #[test]
    fn candidate_defaults_missing_metadata() {
        let candidate: TrackCandidate = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(candidate.title, "Unknown");
        assert_eq!(candidate.artist, "Unknown Artist");
        assert!(candidate.duration_secs.is_none());
    }

    #[test]
    fn fractional_duration_is_rounded() {
        let candidate: TrackCandidate =
            serde_json::from_str(r#"{"id": "x", "duration": 212.6}"#).unwrap();
        assert_eq!(candidate.duration_secs, Some(213));
        let candidate: TrackCandidate =
            serde_json::from_str(r#"{"id": "x", "duration": null}"#).unwrap();
        assert!(candidate.duration_secs.is_none());
    }

    #[test]
    fn track_serializes_with_party_keys() {
        let track = Track {
            queue_instance_id: "q1".into(),
            external_id: "e1".into(),
            title: "T".into(),
            artist: "A".into(),
            thumbnail_url: None,
            duration_secs: Some(90),
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["id"], "q1");
        assert_eq!(json["external_id"], "e1");
        assert_eq!(json["duration"], 90);
        assert!(json.get("thumbnail").is_none());
    }
}
