//! Guest-side reconciliation of a pulled snapshot.
//!
//! Coarse last-writer-wins: the queue is replaced only when its length
//! differs from the remote one. Same-length queues with different contents
//! are left alone. Index, play state and lock are each replaced when they
//! differ.

use super::wire::SessionState;
use crate::queue::PlayQueue;

/// What a reconciliation pass changed locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub queue_replaced: bool,
    pub index_changed: bool,
    /// New play intent, when it differed from the local one.
    pub is_playing: Option<bool>,
    /// New lock flag, when it differed from the local one.
    pub is_locked: Option<bool>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Applies `remote` to the local queue and reports the changes.
///
/// `is_playing` and `is_locked` are the local values; the caller applies the
/// returned replacements to its own state.
pub fn reconcile(
    queue: &mut PlayQueue,
    is_playing: bool,
    is_locked: bool,
    remote: &SessionState,
) -> Reconciliation {
    let mut outcome = Reconciliation::default();
    let before = queue.current_index();

    if queue.len() != remote.queue.len() {
        queue.replace_tracks(remote.queue.clone());
        outcome.queue_replaced = true;
    }

    let remote_index = remote.current();
    if queue.current_index() != remote_index {
        queue.set_current(remote_index);
    }
    outcome.index_changed = queue.current_index() != before;

    if is_playing != remote.is_playing {
        outcome.is_playing = Some(remote.is_playing);
    }
    if is_locked != remote.is_locked {
        outcome.is_locked = Some(remote.is_locked);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Track, TrackCandidate};

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter()
            .map(|id| TrackCandidate::new(*id, "t", "a").into_track())
            .collect()
    }

    fn remote(queue: Vec<Track>, current_index: i64, is_playing: bool) -> SessionState {
        let mut state = SessionState::empty("S", "h", 0);
        state.queue = queue;
        state.current_index = current_index;
        state.is_playing = is_playing;
        state
    }

    fn ext_ids(q: &PlayQueue) -> Vec<&str> {
        q.tracks().iter().map(|t| t.external_id.as_str()).collect()
    }

    #[test]
    fn equal_length_different_content_is_not_reconciled() {
        let mut local = PlayQueue::new();
        local.replace_tracks(tracks(&["a", "b", "c"]));
        local.set_current(Some(0));

        let outcome = reconcile(&mut local, false, false, &remote(tracks(&["x", "y", "z"]), 0, false));

        assert!(outcome.is_noop());
        assert_eq!(ext_ids(&local), vec!["a", "b", "c"]);
    }

    #[test]
    fn different_length_replaces_queue() {
        let mut local = PlayQueue::new();
        local.replace_tracks(tracks(&["a"]));
        local.set_current(Some(0));

        let outcome = reconcile(&mut local, true, false, &remote(tracks(&["x", "y"]), 1, true));

        assert!(outcome.queue_replaced);
        assert!(outcome.index_changed);
        assert_eq!(outcome.is_playing, None);
        assert_eq!(ext_ids(&local), vec!["x", "y"]);
        assert_eq!(local.current_index(), Some(1));
    }

    #[test]
    fn index_and_play_state_replaced_independently() {
        let mut local = PlayQueue::new();
        local.replace_tracks(tracks(&["a", "b"]));
        local.set_current(Some(0));

        let outcome = reconcile(&mut local, false, false, &remote(tracks(&["a", "b"]), 1, true));

        assert!(!outcome.queue_replaced);
        assert!(outcome.index_changed);
        assert_eq!(outcome.is_playing, Some(true));
        assert_eq!(local.current_index(), Some(1));
    }

    #[test]
    fn remote_none_index_clears_current() {
        let mut local = PlayQueue::new();
        local.replace_tracks(tracks(&["a"]));
        local.set_current(Some(0));

        let outcome = reconcile(&mut local, false, false, &remote(tracks(&["a"]), -1, false));

        assert!(outcome.index_changed);
        assert_eq!(local.current_index(), None);
    }

    #[test]
    fn lock_flag_is_reported_when_it_differs() {
        let mut local = PlayQueue::new();
        let mut state = remote(vec![], -1, false);
        state.is_locked = true;

        let outcome = reconcile(&mut local, false, false, &state);

        assert_eq!(outcome.is_locked, Some(true));
        assert!(!outcome.queue_replaced);
    }
}
