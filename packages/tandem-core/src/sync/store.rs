//! Session store abstraction.
//!
//! The session engine talks to the party API through [`SessionStore`]; the
//! HTTP client and the in-memory relay backend both implement it.

use async_trait::async_trait;
use thiserror::Error;

use super::wire::{PushAck, SessionState, VoteTally};
use crate::queue::Track;

/// Errors from session store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request to the store failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Store returned an unexpected non-success status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// No session with this id exists (never created, or ended).
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The supplied host credential does not match the session's.
    #[error("Not the host of this session")]
    WrongHost,

    /// A session with this id already exists.
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// The session is locked against guest contributions.
    #[error("Session is locked: {0}")]
    Locked(String),

    /// Response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Convenient Result alias for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Returns true if the next sync cycle may succeed where this one failed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(_) => true,
            StoreError::HttpStatus(status, _) => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Shared session storage used by hosts and guests.
///
/// Only the host (holder of the credential) writes full state; guests read
/// it and may submit contributions and votes.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Registers a new, empty session owned by `host_credential`.
    async fn create_session(
        &self,
        session_id: &str,
        host_credential: &str,
    ) -> StoreResult<SessionState>;

    /// Fetches the latest snapshot.
    async fn get_session_state(&self, session_id: &str) -> StoreResult<SessionState>;

    /// Overwrites the stored snapshot. Returns pending contributions and votes.
    async fn push_session_state(
        &self,
        session_id: &str,
        host_credential: &str,
        state: &SessionState,
    ) -> StoreResult<PushAck>;

    /// Deletes the session.
    async fn end_session(&self, session_id: &str, host_credential: &str) -> StoreResult<()>;

    /// Submits a guest contribution for the host to pick up on its next push.
    async fn add_track(&self, session_id: &str, track: &Track) -> StoreResult<()>;

    /// Casts a skip vote for the current track.
    async fn vote_skip(&self, session_id: &str, participant_id: &str) -> StoreResult<VoteTally>;
}
