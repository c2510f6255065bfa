//! Playback driver: the only component that touches the media output.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::output::{LoadRequest, MediaError, MediaEvent, MediaOutput, MediaResult, MediaSignal};
use crate::content::{ContentError, StreamResolver};
use crate::queue::Track;

/// Transport state of the output as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Error,
}

/// What the session must react to after a media event.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverNotice {
    /// The current track finished.
    Ended,
    /// The current track cannot be played.
    Fatal(MediaError),
}

#[derive(Debug, Clone)]
struct Loaded {
    external_id: String,
    generation: u64,
}

/// Translates queue position and play intent into output calls.
pub struct PlaybackDriver {
    output: Arc<dyn MediaOutput>,
    resolver: Arc<dyn StreamResolver>,
    state: TransportState,
    loaded: Option<Loaded>,
    generation: u64,
    want_playing: bool,
    position: Duration,
    duration: Option<Duration>,
}

impl PlaybackDriver {
    pub fn new(output: Arc<dyn MediaOutput>, resolver: Arc<dyn StreamResolver>) -> Self {
        Self {
            output,
            resolver,
            state: TransportState::Idle,
            loaded: None,
            generation: 0,
            want_playing: false,
            position: Duration::ZERO,
            duration: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Whether the session wants audio to be playing.
    pub fn wants_playing(&self) -> bool {
        self.want_playing
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Fraction of the current track played, when the duration is known.
    pub fn progress(&self) -> Option<f64> {
        match self.duration {
            Some(d) if !d.is_zero() => Some(self.position.as_secs_f64() / d.as_secs_f64()),
            _ => None,
        }
    }

    pub fn loaded_external_id(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.external_id.as_str())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Points the output at `track`.
    ///
    /// The source is reloaded only when the content id changes. `None` stops
    /// the output and clears its source.
    pub async fn show(&mut self, track: Option<&Track>) -> MediaResult<()> {
        let Some(track) = track else {
            return self.stop().await;
        };

        if self.loaded_external_id() == Some(track.external_id.as_str()) {
            return self.apply_intent().await;
        }

        self.load(track).await?;
        self.apply_intent().await
    }

    /// Records the play intent without touching the output.
    ///
    /// Applied by the next [`show`](Self::show).
    pub fn set_intent(&mut self, playing: bool) {
        self.want_playing = playing;
    }

    /// Sets the play intent and applies it to a loaded source.
    pub async fn set_playing(&mut self, playing: bool) -> MediaResult<()> {
        self.want_playing = playing;
        self.apply_intent().await
    }

    /// Restarts the loaded source from the beginning.
    pub async fn restart(&mut self) -> MediaResult<()> {
        self.seek(Duration::ZERO).await
    }

    /// Seeks within the loaded source, clamped to `[0, duration]`.
    pub async fn seek(&mut self, position: Duration) -> MediaResult<()> {
        if self.loaded.is_none() {
            return Ok(());
        }
        let target = match self.duration {
            Some(d) => position.min(d),
            None => position,
        };
        self.output.seek(target).await?;
        self.position = target;
        Ok(())
    }

    /// Stops the output and forgets the source. Play intent is kept.
    pub async fn stop(&mut self) -> MediaResult<()> {
        let had_source = self.loaded.take().is_some();
        self.state = TransportState::Idle;
        self.position = Duration::ZERO;
        self.duration = None;
        if had_source {
            self.output.stop().await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Folds an output event into the transport state.
    ///
    /// Events from superseded loads and transient errors are absorbed.
    pub fn handle_signal(&mut self, signal: MediaSignal) -> Option<DriverNotice> {
        let current = self.loaded.as_ref()?;
        if signal.generation != current.generation {
            log::trace!(
                "[Playback] Dropping event for stale load {} (current {})",
                signal.generation,
                current.generation
            );
            return None;
        }

        match signal.event {
            MediaEvent::Progress { position, duration } => {
                self.position = position;
                if duration.is_some() {
                    self.duration = duration;
                }
                None
            }
            MediaEvent::Ended => {
                self.state = TransportState::Ended;
                if let Some(d) = self.duration {
                    self.position = d;
                }
                Some(DriverNotice::Ended)
            }
            MediaEvent::Error(err) => self.absorb(err),
        }
    }

    /// Classifies a failure from a driver call the same way as an event.
    pub fn absorb(&mut self, err: MediaError) -> Option<DriverNotice> {
        if err.is_fatal() {
            log::warn!("[Playback] Fatal media error: {}", err);
            self.state = TransportState::Error;
            Some(DriverNotice::Fatal(err))
        } else {
            log::debug!("[Playback] Ignoring transient media error: {}", err);
            None
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn load(&mut self, track: &Track) -> MediaResult<()> {
        self.generation += 1;
        self.state = TransportState::Loading;
        self.position = Duration::ZERO;
        self.duration = track.duration_secs.map(|s| Duration::from_secs(u64::from(s)));

        let source = match self.resolver.resolve(&track.external_id).await {
            Ok(source) => source,
            Err(err) => {
                self.loaded = None;
                self.state = TransportState::Error;
                return Err(resolve_error(err));
            }
        };

        log::info!(
            "[Playback] Loading '{}' ({})",
            track.title,
            track.external_id
        );

        let request = LoadRequest {
            source,
            duration_hint: self.duration,
            generation: self.generation,
        };
        if let Err(err) = self.output.load(request).await {
            // Nothing is loaded, so the next show() reloads.
            self.loaded = None;
            self.state = if err.is_fatal() {
                TransportState::Error
            } else {
                TransportState::Idle
            };
            return Err(err);
        }

        self.loaded = Some(Loaded {
            external_id: track.external_id.clone(),
            generation: self.generation,
        });
        self.state = TransportState::Paused;
        Ok(())
    }

    async fn apply_intent(&mut self) -> MediaResult<()> {
        if self.loaded.is_none() {
            return Ok(());
        }
        match (self.want_playing, self.state) {
            (true, TransportState::Playing) | (false, TransportState::Paused) => Ok(()),
            (true, TransportState::Ended) => {
                self.output.seek(Duration::ZERO).await?;
                self.position = Duration::ZERO;
                self.output.play().await?;
                self.state = TransportState::Playing;
                Ok(())
            }
            (true, _) => {
                self.output.play().await?;
                self.state = TransportState::Playing;
                Ok(())
            }
            (false, TransportState::Playing) => {
                self.output.pause().await?;
                self.state = TransportState::Paused;
                Ok(())
            }
            (false, _) => Ok(()),
        }
    }
}

fn resolve_error(err: ContentError) -> MediaError {
    match err {
        ContentError::Unavailable(msg) => MediaError::fatal(msg),
        other => MediaError::transient(other.to_string()),
    }
}
