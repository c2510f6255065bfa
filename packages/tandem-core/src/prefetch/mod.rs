//! Queue continuation: related-content prefetch, trickle and warm-up.
//!
//! [`TrickleEngine`] only decides. The session loop performs the fetches it
//! asks for and feeds the results back, so every decision here is
//! synchronous and testable without a runtime.

use std::collections::HashSet;

use crate::queue::{PlayQueue, Track, TrackCandidate};
use crate::state::Config;

/// Tuning for the continuation engine.
#[derive(Debug, Clone)]
pub struct TrickleSettings {
    pub related_limit: usize,
    /// Progress fraction of the current track after which trickle may fire.
    pub progress_threshold: f64,
    /// Trickle fires when fewer than this many tracks follow the current one.
    pub low_water: usize,
    pub batch: usize,
    pub warmup_count: usize,
    pub warmup_priority: u8,
}

impl From<&Config> for TrickleSettings {
    fn from(config: &Config) -> Self {
        Self {
            related_limit: config.related_limit,
            progress_threshold: config.trickle_progress,
            low_water: config.trickle_low_water,
            batch: config.trickle_batch,
            warmup_count: config.warmup_count,
            warmup_priority: config.warmup_priority,
        }
    }
}

impl Default for TrickleSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// What to do when the current track ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOfTrack {
    /// A following track exists.
    Advance,
    /// The queue is exhausted but the reserve can refill it.
    Replenish,
    /// Fetch related tracks for this content id, append them, then advance.
    FetchRelated(String),
    /// An end-of-queue fetch is already outstanding.
    AwaitingFallback,
    /// Nothing left to play.
    Exhausted,
}

/// Result of merging an end-of-queue fetch.
#[derive(Debug, Default)]
pub struct FallbackOutcome {
    pub appended: Vec<Track>,
    /// The track that ran out is still current, so playback should move on.
    pub resume: bool,
}

/// Continuation decisions for one session.
#[derive(Debug)]
pub struct TrickleEngine {
    settings: TrickleSettings,
    auto_continue: bool,
    /// Content ids that already triggered a related fetch.
    fetched_for: HashSet<String>,
    /// Instance id of the current track the last trickle fired for.
    trickled_for: Option<String>,
    /// Instance id of the track whose end started the outstanding fallback.
    fallback_for: Option<String>,
    fetch_in_progress: bool,
}

impl TrickleEngine {
    pub fn new(settings: TrickleSettings, auto_continue: bool) -> Self {
        Self {
            settings,
            auto_continue,
            fetched_for: HashSet::new(),
            trickled_for: None,
            fallback_for: None,
            fetch_in_progress: false,
        }
    }

    pub fn settings(&self) -> &TrickleSettings {
        &self.settings
    }

    pub fn auto_continue(&self) -> bool {
        self.auto_continue
    }

    pub fn set_auto_continue(&mut self, enabled: bool) {
        self.auto_continue = enabled;
    }

    pub fn fetch_in_progress(&self) -> bool {
        self.fetch_in_progress
    }

    /// Forgets per-queue bookkeeping (queue cleared or replaced).
    pub fn reset(&mut self) {
        self.fetched_for.clear();
        self.trickled_for = None;
        self.fallback_for = None;
    }

    /// A user added `track`. Returns the content id to fetch related tracks
    /// for, if this add should trigger a prefetch.
    pub fn on_user_add(&mut self, track: &Track, playing: bool) -> Option<String> {
        if !self.auto_continue || !playing {
            return None;
        }
        if !self.fetched_for.insert(track.external_id.clone()) {
            return None;
        }
        self.fetch_in_progress = true;
        log::info!(
            "[Trickle] Prefetching related tracks for '{}' ({})",
            track.title,
            track.external_id
        );
        Some(track.external_id.clone())
    }

    /// Stages a prefetch result in the reserve. Returns the new reserve size.
    pub fn on_related(&mut self, queue: &mut PlayQueue, candidates: Vec<TrackCandidate>) -> usize {
        self.fetch_in_progress = false;
        let received = candidates.len();
        let staged = queue.stage_candidates(candidates);
        log::info!(
            "[Trickle] Reserve replaced: {} of {} related tracks staged",
            staged,
            received
        );
        staged
    }

    pub fn on_fetch_failed(&mut self) {
        self.fetch_in_progress = false;
    }

    /// Called on every progress update. Moves tracks from the reserve when
    /// the current track is far enough along and the queue is running low.
    ///
    /// Fires at most once per track occupying the current index.
    pub fn on_progress(&mut self, queue: &mut PlayQueue, progress: f64) -> Vec<Track> {
        if !self.auto_continue || progress < self.settings.progress_threshold {
            return Vec::new();
        }
        let Some(current_id) = queue.current_track().map(|t| t.queue_instance_id.clone()) else {
            return Vec::new();
        };
        if self.trickled_for.as_deref() == Some(current_id.as_str()) {
            return Vec::new();
        }
        if queue.remaining_after_current() >= self.settings.low_water || queue.reserve().is_empty() {
            return Vec::new();
        }

        self.trickled_for = Some(current_id);
        let moved = queue.trickle(self.settings.batch);
        log::info!(
            "[Trickle] Moved {} track(s) from reserve ({} left)",
            moved.len(),
            queue.reserve().len()
        );
        moved
    }

    /// Reserve content ids to warm up after a queue change.
    pub fn warmup_targets(&self, queue: &PlayQueue) -> Vec<String> {
        queue.reserve().peek_ids(self.settings.warmup_count)
    }

    /// Decides how playback continues after the current track ends.
    pub fn on_track_end(&mut self, queue: &PlayQueue) -> EndOfTrack {
        if queue.has_next() {
            return EndOfTrack::Advance;
        }
        if !self.auto_continue {
            return EndOfTrack::Exhausted;
        }
        if !queue.reserve().is_empty() {
            return EndOfTrack::Replenish;
        }
        if self.fallback_for.is_some() {
            return EndOfTrack::AwaitingFallback;
        }
        match queue.last_track() {
            Some(last) => {
                self.fetch_in_progress = true;
                self.fallback_for = Some(last.queue_instance_id.clone());
                EndOfTrack::FetchRelated(last.external_id.clone())
            }
            None => EndOfTrack::Exhausted,
        }
    }

    /// Merges an end-of-queue fetch result.
    ///
    /// Results arriving after a reset are dropped. Tracks are appended either
    /// way, but playback only resumes if the user has not moved on meanwhile.
    pub fn on_fallback(
        &mut self,
        queue: &mut PlayQueue,
        candidates: Vec<TrackCandidate>,
    ) -> FallbackOutcome {
        self.fetch_in_progress = false;
        let Some(ended) = self.fallback_for.take() else {
            log::debug!("[Trickle] Dropping end-of-queue result for a replaced queue");
            return FallbackOutcome::default();
        };
        let resume = queue
            .current_track()
            .is_some_and(|t| t.queue_instance_id == ended);
        FallbackOutcome {
            appended: queue.append_continuation(candidates),
            resume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str) -> TrackCandidate {
        TrackCandidate::new(id, "t", "a")
    }

    fn engine() -> TrickleEngine {
        TrickleEngine::new(TrickleSettings::default(), true)
    }

    #[test]
    fn prefetch_triggers_once_per_content_id() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        let (a, _) = queue.add(cand("a"));
        let (a2, _) = queue.add(cand("a"));

        assert_eq!(engine.on_user_add(&a, true), Some("a".to_string()));
        assert!(engine.fetch_in_progress());
        assert_eq!(engine.on_user_add(&a2, true), None);
    }

    #[test]
    fn prefetch_requires_playback_and_auto_continue() {
        let mut queue = PlayQueue::new();
        let (a, _) = queue.add(cand("a"));

        let mut engine = engine();
        assert_eq!(engine.on_user_add(&a, false), None);

        let mut engine = TrickleEngine::new(TrickleSettings::default(), false);
        assert_eq!(engine.on_user_add(&a, true), None);
    }

    #[test]
    fn related_result_replaces_reserve_without_duplicates() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));

        let staged = engine.on_related(&mut queue, vec![cand("a"), cand("b"), cand("c")]);

        assert_eq!(staged, 2);
        assert!(!engine.fetch_in_progress());
        assert_eq!(engine.warmup_targets(&queue), vec!["b", "c"]);
    }

    #[test]
    fn trickle_fires_once_per_current_track() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));
        engine.on_related(&mut queue, (0..20).map(|i| cand(&format!("r{i}"))).collect());

        assert!(engine.on_progress(&mut queue, 0.1).is_empty());

        let moved = engine.on_progress(&mut queue, 0.35);
        assert_eq!(moved.len(), 10);
        assert_eq!(queue.len(), 11);

        // Same track, even though the queue is refilled and progress grows.
        assert!(engine.on_progress(&mut queue, 0.9).is_empty());
    }

    #[test]
    fn trickle_waits_for_low_water() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        for id in ["a", "b", "c", "d"] {
            queue.add(cand(id));
        }
        engine.on_related(&mut queue, vec![cand("r")]);

        assert!(engine.on_progress(&mut queue, 0.5).is_empty());

        queue.play_at(1);
        let moved = engine.on_progress(&mut queue, 0.5);
        assert_eq!(moved.len(), 1);
    }

    #[test]
    fn trickle_fires_again_for_the_next_track() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));
        engine.on_related(&mut queue, (0..30).map(|i| cand(&format!("r{i}"))).collect());

        engine.on_progress(&mut queue, 0.5);
        for _ in 0..9 {
            queue.next();
        }
        let moved = engine.on_progress(&mut queue, 0.5);
        assert_eq!(moved.len(), 10);
    }

    #[test]
    fn end_of_queue_with_empty_reserve_fetches_for_last_track() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));

        assert_eq!(
            engine.on_track_end(&queue),
            EndOfTrack::FetchRelated("a".to_string())
        );

        let outcome = engine.on_fallback(&mut queue, vec![cand("d"), cand("e")]);
        assert_eq!(outcome.appended.len(), 2);
        assert!(outcome.resume);
        queue.next();
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn end_of_queue_prefers_reserve_then_stops_without_auto_continue() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));
        engine.on_related(&mut queue, vec![cand("b")]);
        assert_eq!(engine.on_track_end(&queue), EndOfTrack::Replenish);

        engine.set_auto_continue(false);
        assert_eq!(engine.on_track_end(&queue), EndOfTrack::Exhausted);

        queue.add(cand("c"));
        assert_eq!(engine.on_track_end(&queue), EndOfTrack::Advance);
    }

    #[test]
    fn end_of_queue_fetch_is_not_repeated_while_outstanding() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));

        assert!(matches!(engine.on_track_end(&queue), EndOfTrack::FetchRelated(_)));
        assert_eq!(engine.on_track_end(&queue), EndOfTrack::AwaitingFallback);

        let outcome = engine.on_fallback(&mut queue, vec![cand("d")]);
        assert!(outcome.resume);
        queue.next();
        assert_eq!(engine.on_track_end(&queue), EndOfTrack::FetchRelated("d".to_string()));
    }

    #[test]
    fn end_of_queue_result_does_not_resume_after_user_moved_on() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));
        queue.add(cand("b"));
        queue.play_at(1);

        assert_eq!(engine.on_track_end(&queue), EndOfTrack::FetchRelated("b".to_string()));
        queue.play_at(0);

        let outcome = engine.on_fallback(&mut queue, vec![cand("d")]);
        assert_eq!(outcome.appended.len(), 1);
        assert!(!outcome.resume);
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn end_of_queue_result_after_reset_is_dropped() {
        let mut engine = engine();
        let mut queue = PlayQueue::new();
        queue.add(cand("a"));
        engine.on_track_end(&queue);

        queue.clear();
        engine.reset();

        let outcome = engine.on_fallback(&mut queue, vec![cand("d")]);
        assert!(outcome.appended.is_empty());
        assert!(!engine.fetch_in_progress());
        assert!(queue.is_empty());
    }
}
