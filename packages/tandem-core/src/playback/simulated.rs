//! Timer-driven output for the headless node and tests.
//!
//! Plays nothing; advances a virtual clock while "playing" and reports
//! progress and track end like a real element would.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::output::{
    LoadRequest, MediaError, MediaErrorKind, MediaEvent, MediaOutput, MediaResult, MediaSignal,
};

/// Length assumed for sources without a duration hint.
const DEFAULT_TRACK_LENGTH: Duration = Duration::from_secs(180);

/// Progress reporting period.
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct Clock {
    generation: u64,
    loaded: bool,
    playing: bool,
    position: Duration,
    duration: Duration,
}

/// Virtual audio element.
pub struct SimulatedOutput {
    clock: Arc<Mutex<Clock>>,
    events: mpsc::Sender<MediaSignal>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    /// Content ids that fail to load, with the failure kind.
    failures: Mutex<HashMap<String, MediaErrorKind>>,
}

impl SimulatedOutput {
    /// Creates an output and the receiver for its events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MediaSignal>) {
        let (tx, rx) = mpsc::channel(capacity);
        let output = Self {
            clock: Arc::new(Mutex::new(Clock::default())),
            events: tx,
            ticker: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
        };
        (output, rx)
    }

    /// Makes every future load of `external_id` fail with `kind`.
    pub fn fail_loads_of(&self, external_id: impl Into<String>, kind: MediaErrorKind) {
        self.failures.lock().insert(external_id.into(), kind);
    }

    /// Current virtual position.
    pub fn position(&self) -> Duration {
        self.clock.lock().position
    }

    pub fn is_playing(&self) -> bool {
        self.clock.lock().playing
    }

    fn abort_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    fn spawn_ticker(&self, generation: u64) {
        let clock = Arc::clone(&self.clock);
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            interval.tick().await;

            loop {
                interval.tick().await;

                let event = {
                    let mut c = clock.lock();
                    if c.generation != generation {
                        break;
                    }
                    if !c.playing {
                        continue;
                    }
                    c.position = (c.position + TICK).min(c.duration);
                    if c.position >= c.duration {
                        c.playing = false;
                        MediaEvent::Ended
                    } else {
                        MediaEvent::Progress {
                            position: c.position,
                            duration: Some(c.duration),
                        }
                    }
                };

                let ended = event == MediaEvent::Ended;
                if events.send(MediaSignal { generation, event }).await.is_err() || ended {
                    break;
                }
            }
        });

        *self.ticker.lock() = Some(handle);
    }
}

#[async_trait]
impl MediaOutput for SimulatedOutput {
    async fn load(&self, request: LoadRequest) -> MediaResult<()> {
        self.abort_ticker();

        let failure = self
            .failures
            .lock()
            .get(&request.source.external_id)
            .copied();
        if let Some(kind) = failure {
            let mut c = self.clock.lock();
            c.loaded = false;
            c.playing = false;
            return Err(MediaError {
                kind,
                message: format!("cannot load {}", request.source.url),
            });
        }

        {
            let mut c = self.clock.lock();
            c.generation = request.generation;
            c.loaded = true;
            c.playing = false;
            c.position = Duration::ZERO;
            c.duration = request.duration_hint.unwrap_or(DEFAULT_TRACK_LENGTH);
        }
        self.spawn_ticker(request.generation);
        Ok(())
    }

    async fn play(&self) -> MediaResult<()> {
        let generation = {
            let mut c = self.clock.lock();
            if !c.loaded {
                return Err(MediaError::transient("play without a source"));
            }
            c.playing = true;
            c.generation
        };

        // The ticker exits after reporting the end; replaying needs a new one.
        let finished = self
            .ticker
            .lock()
            .as_ref()
            .map_or(true, |handle| handle.is_finished());
        if finished {
            self.spawn_ticker(generation);
        }
        Ok(())
    }

    async fn pause(&self) -> MediaResult<()> {
        self.clock.lock().playing = false;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> MediaResult<()> {
        let mut c = self.clock.lock();
        if !c.loaded {
            return Err(MediaError::transient("seek without a source"));
        }
        c.position = position.min(c.duration);
        Ok(())
    }

    async fn stop(&self) -> MediaResult<()> {
        self.abort_ticker();
        let mut c = self.clock.lock();
        c.loaded = false;
        c.playing = false;
        c.position = Duration::ZERO;
        Ok(())
    }
}

impl Drop for SimulatedOutput {
    fn drop(&mut self) {
        self.abort_ticker();
    }
}
