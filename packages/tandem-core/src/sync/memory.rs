//! In-memory session store backing the relay.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::store::{SessionStore, StoreError, StoreResult};
use super::wire::{PushAck, SessionState, VoteTally};
use crate::queue::Track;
use crate::utils::now_millis;

/// One stored session plus the bookkeeping the host never sees directly.
#[derive(Debug)]
struct StoredSession {
    state: SessionState,
    /// Participants who voted to skip the current track.
    votes: HashSet<String>,
    /// Every participant that has voted this session.
    active_users: HashSet<String>,
    /// Guest contributions waiting for the next host push.
    pending: Vec<Track>,
}

impl StoredSession {
    fn new(state: SessionState) -> Self {
        Self {
            state,
            votes: HashSet::new(),
            active_users: HashSet::new(),
            pending: Vec::new(),
        }
    }

    fn tally(&self) -> VoteTally {
        let threshold = VoteTally::threshold_for(self.active_users.len());
        VoteTally {
            votes: self.votes.len(),
            threshold,
            should_skip: !self.votes.is_empty() && self.votes.len() >= threshold,
        }
    }
}

/// Session documents keyed by session id.
///
/// Each entry is mutated under its `DashMap` shard lock, so concurrent
/// requests for different sessions never contend.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(
        &self,
        session_id: &str,
        host_credential: &str,
    ) -> StoreResult<SessionState> {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::SessionExists(session_id.to_string())),
            Entry::Vacant(slot) => {
                let state = SessionState::empty(session_id, host_credential, now_millis());
                slot.insert(StoredSession::new(state.clone()));
                log::info!("[SessionStore] Created session {}", session_id);
                Ok(state)
            }
        }
    }

    async fn get_session_state(&self, session_id: &str) -> StoreResult<SessionState> {
        self.sessions
            .get(session_id)
            .map(|s| s.state.clone())
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    async fn push_session_state(
        &self,
        session_id: &str,
        host_credential: &str,
        state: &SessionState,
    ) -> StoreResult<PushAck> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        if session.state.host_id != host_credential {
            return Err(StoreError::WrongHost);
        }

        if session.state.current_index != state.current_index {
            session.votes.clear();
        }

        session.state = SessionState {
            session_id: session_id.to_string(),
            host_id: host_credential.to_string(),
            queue: state.queue.clone(),
            current_index: state.current_index,
            is_playing: state.is_playing,
            is_locked: state.is_locked,
            updated_at: now_millis(),
        };

        let skip_requested = session.tally().should_skip;
        if skip_requested {
            // Reported once; the host's skip changes the index anyway.
            session.votes.clear();
        }

        Ok(PushAck {
            contributions: std::mem::take(&mut session.pending),
            skip_requested,
        })
    }

    async fn end_session(&self, session_id: &str, host_credential: &str) -> StoreResult<()> {
        let owner = self
            .sessions
            .get(session_id)
            .map(|s| s.state.host_id.clone())
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        if owner != host_credential {
            return Err(StoreError::WrongHost);
        }

        self.sessions
            .remove_if(session_id, |_, s| s.state.host_id == host_credential);
        log::info!("[SessionStore] Ended session {}", session_id);
        Ok(())
    }

    async fn add_track(&self, session_id: &str, track: &Track) -> StoreResult<()> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        if session.state.is_locked {
            return Err(StoreError::Locked(session_id.to_string()));
        }

        session.pending.push(track.clone());
        session.state.updated_at = now_millis();
        Ok(())
    }

    async fn vote_skip(&self, session_id: &str, participant_id: &str) -> StoreResult<VoteTally> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        session.active_users.insert(participant_id.to_string());
        session.votes.insert(participant_id.to_string());
        session.state.updated_at = now_millis();
        Ok(session.tally())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TrackCandidate;

    fn track(id: &str) -> Track {
        TrackCandidate::new(id, "t", "a").into_track()
    }

    async fn store_with_session() -> MemorySessionStore {
        let store = MemorySessionStore::new();
        store.create_session("S1", "host").await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let store = store_with_session().await;
        let err = store.create_session("S1", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::SessionExists(_)));
    }

    #[tokio::test]
    async fn get_unknown_session_is_not_found() {
        let store = MemorySessionStore::new();
        let err = store.get_session_state("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn push_with_wrong_credential_is_rejected() {
        let store = store_with_session().await;
        let state = SessionState::empty("S1", "intruder", 0);
        let err = store
            .push_session_state("S1", "intruder", &state)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WrongHost));
    }

    #[tokio::test]
    async fn push_replaces_state_and_keeps_identity() {
        let store = store_with_session().await;
        let mut state = SessionState::empty("ignored", "ignored", 0);
        state.queue = vec![track("a"), track("b")];
        state.current_index = 1;
        state.is_playing = true;

        store.push_session_state("S1", "host", &state).await.unwrap();

        let stored = store.get_session_state("S1").await.unwrap();
        assert_eq!(stored.session_id, "S1");
        assert_eq!(stored.host_id, "host");
        assert_eq!(stored.queue.len(), 2);
        assert_eq!(stored.current_index, 1);
        assert!(stored.is_playing);
        assert!(stored.updated_at > 0);
    }

    #[tokio::test]
    async fn contributions_are_delivered_once_on_push() {
        let store = store_with_session().await;
        store.add_track("S1", &track("g1")).await.unwrap();
        store.add_track("S1", &track("g2")).await.unwrap();

        let state = store.get_session_state("S1").await.unwrap();
        let ack = store.push_session_state("S1", "host", &state).await.unwrap();
        assert_eq!(ack.contributions.len(), 2);

        let ack = store.push_session_state("S1", "host", &state).await.unwrap();
        assert!(ack.contributions.is_empty());
    }

    #[tokio::test]
    async fn locked_session_refuses_contributions() {
        let store = store_with_session().await;
        let mut state = store.get_session_state("S1").await.unwrap();
        state.is_locked = true;
        store.push_session_state("S1", "host", &state).await.unwrap();

        let err = store.add_track("S1", &track("g")).await.unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
    }

    #[tokio::test]
    async fn votes_reach_majority_and_request_skip() {
        let store = store_with_session().await;
        let mut state = store.get_session_state("S1").await.unwrap();
        state.queue = vec![track("a"), track("b")];
        state.current_index = 0;
        store.push_session_state("S1", "host", &state).await.unwrap();

        let first = store.vote_skip("S1", "u1").await.unwrap();
        assert_eq!(first.votes, 1);
        assert_eq!(first.threshold, 1);
        assert!(first.should_skip);

        let ack = store.push_session_state("S1", "host", &state).await.unwrap();
        assert!(ack.skip_requested);

        let ack = store.push_session_state("S1", "host", &state).await.unwrap();
        assert!(!ack.skip_requested);
    }

    #[tokio::test]
    async fn index_change_clears_votes() {
        let store = store_with_session().await;
        let mut state = store.get_session_state("S1").await.unwrap();
        state.queue = vec![track("a"), track("b")];
        state.current_index = 0;
        store.push_session_state("S1", "host", &state).await.unwrap();

        store.vote_skip("S1", "u1").await.unwrap();
        store.vote_skip("S1", "u2").await.unwrap();
        store.vote_skip("S1", "u3").await.unwrap();

        state.current_index = 1;
        let ack = store.push_session_state("S1", "host", &state).await.unwrap();
        assert!(!ack.skip_requested);

        let tally = store.vote_skip("S1", "u1").await.unwrap();
        assert_eq!(tally.votes, 1);
        assert_eq!(tally.threshold, 2);
        assert!(!tally.should_skip);
    }

    #[tokio::test]
    async fn only_the_host_can_end_a_session() {
        let store = store_with_session().await;
        assert!(matches!(
            store.end_session("S1", "guest").await,
            Err(StoreError::WrongHost)
        ));
        store.end_session("S1", "host").await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.end_session("S1", "host").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
