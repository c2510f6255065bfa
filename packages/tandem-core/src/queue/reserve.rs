//! Hidden supply buffer for automatic queue continuation.

use std::collections::{HashSet, VecDeque};

use super::track::{Track, TrackCandidate};

/// Ordered candidates held outside the visible queue.
///
/// Deduplicated by `external_id`, both internally and against the queue at
/// the moment of every insertion and release.
#[derive(Debug, Default, Clone)]
pub struct Reserve {
    tracks: VecDeque<TrackCandidate>,
}

impl Reserve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Whether a candidate with this content id is staged.
    pub fn contains(&self, external_id: &str) -> bool {
        self.tracks.iter().any(|t| t.external_id == external_id)
    }

    /// Replaces the reserve with `candidates`.
    ///
    /// Candidates whose content already appears in `queue` or in the current
    /// reserve are dropped, as are repeats within `candidates`. The old
    /// contents are then discarded, so the latest fetch decides what is staged.
    ///
    /// Returns the new reserve size.
    pub fn replace(&mut self, candidates: Vec<TrackCandidate>, queue: &[Track]) -> usize {
        let mut seen: HashSet<String> = queue.iter().map(|t| t.external_id.clone()).collect();
        seen.extend(self.tracks.iter().map(|t| t.external_id.clone()));

        let fresh: VecDeque<TrackCandidate> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.external_id.clone()))
            .collect();

        self.tracks = fresh;
        self.tracks.len()
    }

    /// Removes up to `max` candidates from the front, skipping any whose
    /// content is already in the live `queue`.
    ///
    /// Skipped duplicates are discarded rather than kept for later.
    pub fn take_front(&mut self, max: usize, queue: &[Track]) -> Vec<TrackCandidate> {
        let mut seen: HashSet<String> = queue.iter().map(|t| t.external_id.clone()).collect();
        let mut taken = Vec::new();

        while taken.len() < max {
            let Some(candidate) = self.tracks.pop_front() else {
                break;
            };
            if seen.insert(candidate.external_id.clone()) {
                taken.push(candidate);
            }
        }
        taken
    }

    /// The first `n` staged content ids, in release order.
    pub fn peek_ids(&self, n: usize) -> Vec<String> {
        self.tracks
            .iter()
            .take(n)
            .map(|t| t.external_id.clone())
            .collect()
    }
}
