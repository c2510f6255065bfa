//! Media content service: related tracks, audio warm-up and stream URLs.

mod http;

pub use http::HttpContentService;

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::TrackCandidate;

/// Errors from the content service.
#[derive(Debug, Error)]
pub enum ContentError {
    /// HTTP request to the content service failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Content service returned a non-success status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The requested content cannot be streamed.
    #[error("Content unavailable: {0}")]
    Unavailable(String),
}

/// Convenient Result alias for content operations.
pub type ContentResult<T> = Result<T, ContentError>;

/// A playable source for one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    pub external_id: String,
    pub url: String,
}

/// Supplies continuation candidates and warms the stream cache.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Up to `limit` tracks related to `external_id`, in recommendation order.
    async fn fetch_related(
        &self,
        external_id: &str,
        limit: usize,
    ) -> ContentResult<Vec<TrackCandidate>>;

    /// Asks the service to prepare a stream in the background.
    ///
    /// Priority 1 is "playing now", 2 "next up", 3 "visible".
    async fn request_warmup(&self, external_id: &str, priority: u8) -> ContentResult<()>;
}

/// Resolves content ids to playable sources.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, external_id: &str) -> ContentResult<StreamSource>;
}
