//! Media output abstraction.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::content::StreamSource;

/// Whether a media failure should be absorbed or surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaErrorKind {
    /// Expected during rapid source changes (aborted loads, interrupted play).
    Transient,
    /// The source cannot be played.
    Fatal,
}

/// A failure reported by a [`MediaOutput`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?} media error: {message}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: MediaErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: MediaErrorKind::Fatal,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind == MediaErrorKind::Fatal
    }
}

/// Convenient Result alias for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Asynchronous notification from the output.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },
    Ended,
    Error(MediaError),
}

/// A [`MediaEvent`] tagged with the load it belongs to.
///
/// Events from a superseded load are discarded by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSignal {
    pub generation: u64,
    pub event: MediaEvent,
}

/// Everything an output needs to load a new source.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: StreamSource,
    /// Length advertised by the content service, if known.
    pub duration_hint: Option<Duration>,
    pub generation: u64,
}

/// One audio output element. Only the playback driver calls it.
///
/// Implementations deliver [`MediaSignal`]s on a channel handed out at
/// construction time.
#[async_trait]
pub trait MediaOutput: Send + Sync {
    async fn load(&self, request: LoadRequest) -> MediaResult<()>;
    async fn play(&self) -> MediaResult<()>;
    async fn pause(&self) -> MediaResult<()>;
    async fn seek(&self, position: Duration) -> MediaResult<()>;
    /// Stops playback and clears the source.
    async fn stop(&self) -> MediaResult<()>;
}
