//! Event system for session observers.
//!
//! This module provides:
//! - [`EventEmitter`] trait for the session loop to emit events
//! - [`BroadcastEventBridge`] for fan-out to any number of subscribers
//! - Event types for each concern (queue, transport, sync, notices)

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::playback::TransportState;

/// Events broadcast to session observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum SessionEvent {
    /// Queue contents, current index or reserve changed.
    Queue(QueueEvent),

    /// Local playback state changed.
    Transport(TransportEvent),

    /// State exchange with the session store.
    Sync(SyncEvent),

    /// User-visible, one-shot messages.
    Notice(NoticeEvent),
}

/// Events related to the queue and reserve.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueEvent {
    /// The visible queue or current index changed.
    Changed {
        #[serde(rename = "sessionId")]
        session_id: String,
        length: usize,
        /// Wire index (-1 for none).
        #[serde(rename = "currentIndex")]
        current_index: i64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The reserve was replaced by a related-content fetch.
    ReserveStaged {
        size: usize,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Tracks moved from the reserve into the queue.
    Trickled {
        count: usize,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to local playback.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransportEvent {
    /// The driver's transport state changed.
    StateChanged {
        state: TransportState,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A different track became current.
    TrackChanged {
        #[serde(rename = "queueInstanceId")]
        queue_instance_id: String,
        #[serde(rename = "externalId")]
        external_id: String,
        title: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Direction of a sync exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncDirection {
    Push,
    Pull,
}

/// Events related to state exchange with the store.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// Host snapshot accepted by the store.
    Pushed {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Guest contributions received with the acknowledgement.
        contributions: usize,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Guest pulled and reconciled a snapshot.
    Pulled {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "queueReplaced")]
        queue_replaced: bool,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A push or pull failed; the next cycle retries.
    Failed {
        direction: SyncDirection,
        error: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// This participant gained write authority.
    Elevated {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// One-shot, user-visible messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NoticeEvent {
    /// Joining a session failed; no local state was changed.
    JoinFailed {
        #[serde(rename = "sessionId")]
        session_id: String,
        reason: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The host ended the session.
    SessionEnded {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A track could not be played and will be skipped.
    PlaybackFailed {
        #[serde(rename = "externalId")]
        external_id: String,
        message: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The queue ran out and nothing could be appended.
    QueueExhausted {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A queue edit was refused because the session is locked.
    SessionLocked {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// An elevation attempt was refused.
    ElevationRefused {
        reason: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Result of this participant's skip vote.
    VoteCast {
        votes: usize,
        threshold: usize,
        #[serde(rename = "shouldSkip")]
        should_skip: bool,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Another playback subsystem took audio focus.
    FocusLost {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Replay snapshot saved or restored.
    Replay {
        action: ReplayAction,
        #[serde(rename = "sessionId")]
        session_id: String,
        tracks: usize,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// What happened to the replay snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplayAction {
    Saved,
    Restored,
}

impl From<QueueEvent> for SessionEvent {
    fn from(event: QueueEvent) -> Self {
        SessionEvent::Queue(event)
    }
}

impl From<TransportEvent> for SessionEvent {
    fn from(event: TransportEvent) -> Self {
        SessionEvent::Transport(event)
    }
}

impl From<SyncEvent> for SessionEvent {
    fn from(event: SyncEvent) -> Self {
        SessionEvent::Sync(event)
    }
}

impl From<NoticeEvent> for SessionEvent {
    fn from(event: NoticeEvent) -> Self {
        SessionEvent::Notice(event)
    }
}
