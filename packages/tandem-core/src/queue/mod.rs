//! Track and queue model.
//!
//! [`PlayQueue`] owns the visible queue, the current index and the hidden
//! [`Reserve`]. Every mutation is synchronous and total: unknown ids and
//! out-of-range indices are no-ops. Mutations return a [`QueueEffect`] that
//! tells the session loop what the playback driver must do; the queue itself
//! never performs I/O.

mod reserve;
mod track;

use std::collections::HashSet;

pub use reserve::Reserve;
pub use track::{Track, TrackCandidate};

/// What the playback driver must do after a queue mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEffect {
    /// The current track is unchanged.
    None,
    /// A track was selected explicitly and should start playing.
    Play,
    /// The current track changed implicitly; keep the play/pause intent.
    Continue,
    /// Nothing is selected any more; stop playback.
    Stop,
}

/// Ordered queue, current pointer and reserve for one session.
#[derive(Debug, Default, Clone)]
pub struct PlayQueue {
    tracks: Vec<Track>,
    current: Option<usize>,
    reserve: Reserve,
    /// Most recent track added by a user (not by continuation).
    last_user_added: Option<Track>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Last track in the queue, used for end-of-queue related fetches.
    pub fn last_track(&self) -> Option<&Track> {
        self.tracks.last()
    }

    pub fn last_user_added(&self) -> Option<&Track> {
        self.last_user_added.as_ref()
    }

    /// Number of tracks queued after the current one.
    pub fn remaining_after_current(&self) -> usize {
        match self.current {
            Some(i) => self.tracks.len().saturating_sub(i + 1),
            None => self.tracks.len(),
        }
    }

    pub fn has_next(&self) -> bool {
        matches!(self.current, Some(i) if i + 1 < self.tracks.len())
    }

    pub fn reserve(&self) -> &Reserve {
        &self.reserve
    }

    /// Replaces the reserve with deduplicated related candidates.
    pub fn stage_candidates(&mut self, candidates: Vec<TrackCandidate>) -> usize {
        self.reserve.replace(candidates, &self.tracks)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // User operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a track. Starts playback when the queue was empty.
    pub fn add(&mut self, candidate: TrackCandidate) -> (Track, QueueEffect) {
        let track = candidate.into_track();
        let was_empty = self.tracks.is_empty();
        self.tracks.push(track.clone());
        self.last_user_added = Some(track.clone());

        if was_empty {
            self.current = Some(0);
            (track, QueueEffect::Play)
        } else {
            (track, QueueEffect::None)
        }
    }

    /// Inserts a track right after the current one ("play next").
    pub fn add_next(&mut self, candidate: TrackCandidate) -> (Track, QueueEffect) {
        let track = candidate.into_track();
        self.last_user_added = Some(track.clone());

        if self.tracks.is_empty() {
            self.tracks.push(track.clone());
            self.current = Some(0);
            return (track, QueueEffect::Play);
        }

        let at = self.current.map_or(0, |i| i + 1);
        self.tracks.insert(at, track.clone());
        // Insertion at 0 with nothing selected does not move a pointer.
        (track, QueueEffect::None)
    }

    /// Removes the entry with the given instance id.
    pub fn remove(&mut self, queue_instance_id: &str) -> QueueEffect {
        let Some(pos) = self
            .tracks
            .iter()
            .position(|t| t.queue_instance_id == queue_instance_id)
        else {
            return QueueEffect::None;
        };

        self.tracks.remove(pos);

        if self.tracks.is_empty() {
            self.current = None;
            return QueueEffect::Stop;
        }

        match self.current {
            Some(c) if c == pos => {
                if c >= self.tracks.len() {
                    self.current = Some(self.tracks.len() - 1);
                }
                QueueEffect::Continue
            }
            Some(c) if pos < c => {
                self.current = Some(c - 1);
                QueueEffect::None
            }
            _ => QueueEffect::None,
        }
    }

    /// Moves one entry, keeping the current pointer on the same logical track.
    pub fn reorder(&mut self, from: usize, to: usize) -> QueueEffect {
        let len = self.tracks.len();
        if from >= len || to >= len || from == to {
            return QueueEffect::None;
        }

        let moved = self.tracks.remove(from);
        self.tracks.insert(to, moved);

        if let Some(c) = self.current {
            self.current = Some(if c == from {
                to
            } else if from < c && to >= c {
                c - 1
            } else if from > c && to <= c {
                c + 1
            } else {
                c
            });
        }
        QueueEffect::None
    }

    /// Selects a track and requests playback.
    pub fn play_at(&mut self, index: usize) -> QueueEffect {
        if index >= self.tracks.len() {
            return QueueEffect::None;
        }
        self.current = Some(index);
        QueueEffect::Play
    }

    /// Empties queue and reserve.
    pub fn clear(&mut self) -> QueueEffect {
        self.tracks.clear();
        self.reserve.clear();
        self.current = None;
        self.last_user_added = None;
        QueueEffect::Stop
    }

    /// Skips forward. No-op at the end of the queue.
    pub fn next(&mut self) -> QueueEffect {
        match self.current {
            Some(i) if i + 1 < self.tracks.len() => {
                self.current = Some(i + 1);
                QueueEffect::Play
            }
            None if !self.tracks.is_empty() => {
                self.current = Some(0);
                QueueEffect::Play
            }
            _ => QueueEffect::None,
        }
    }

    /// Skips backward. No-op at the start of the queue.
    pub fn previous(&mut self) -> QueueEffect {
        match self.current {
            Some(i) if i > 0 => {
                self.current = Some(i - 1);
                QueueEffect::Play
            }
            _ => QueueEffect::None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Continuation and sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends candidates produced by the engine (not a user add).
    ///
    /// Returns the tracks actually appended; content already queued is skipped.
    pub fn append_continuation(&mut self, candidates: Vec<TrackCandidate>) -> Vec<Track> {
        let mut seen: HashSet<String> = self.tracks.iter().map(|t| t.external_id.clone()).collect();
        let appended: Vec<Track> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.external_id.clone()))
            .map(TrackCandidate::into_track)
            .collect();
        self.tracks.extend(appended.iter().cloned());
        appended
    }

    /// Moves up to `max` tracks from the reserve front into the queue.
    pub fn trickle(&mut self, max: usize) -> Vec<Track> {
        let released = self.reserve.take_front(max, &self.tracks);
        self.append_continuation(released)
    }

    /// Appends tracks contributed by guests, keeping their instance ids.
    ///
    /// Entries whose instance id is already queued are ignored. Starts
    /// playback when the queue was empty.
    pub fn append_contributions(&mut self, contributions: Vec<Track>) -> QueueEffect {
        let was_empty = self.tracks.is_empty();
        let mut ids: HashSet<String> = self
            .tracks
            .iter()
            .map(|t| t.queue_instance_id.clone())
            .collect();

        for track in contributions {
            if ids.insert(track.queue_instance_id.clone()) {
                self.tracks.push(track);
            }
        }

        if was_empty && !self.tracks.is_empty() {
            self.current = Some(0);
            QueueEffect::Play
        } else {
            QueueEffect::None
        }
    }

    /// Replaces the visible queue wholesale (guest pull, replay restore).
    ///
    /// Duplicate instance ids are dropped and the current pointer is clamped.
    pub fn replace_tracks(&mut self, tracks: Vec<Track>) {
        let mut ids = HashSet::new();
        self.tracks = tracks
            .into_iter()
            .filter(|t| ids.insert(t.queue_instance_id.clone()))
            .collect();
        self.current = self.clamp(self.current);
    }

    /// Sets the current pointer directly, clamped to the queue bounds.
    pub fn set_current(&mut self, index: Option<usize>) {
        self.current = self.clamp(index);
    }

    fn clamp(&self, index: Option<usize>) -> Option<usize> {
        match index {
            _ if self.tracks.is_empty() => None,
            Some(i) if i >= self.tracks.len() => Some(self.tracks.len() - 1),
            other => other,
        }
    }
}
