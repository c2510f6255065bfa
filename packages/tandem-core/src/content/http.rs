//! Content service client for the streaming HTTP API.

use async_trait::async_trait;
use reqwest::Client;

use super::{ContentError, ContentResult, ContentService, StreamResolver, StreamSource};
use crate::protocol_constants::STREAMING_API_PREFIX;
use crate::queue::TrackCandidate;

/// Talks to `/api/streaming/youtube/*` on the content host.
#[derive(Clone)]
pub struct HttpContentService {
    client: Client,
    base_url: String,
}

impl HttpContentService {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Direct stream URL for a content id.
    pub fn stream_url(&self, external_id: &str) -> String {
        format!("{}{}/{}", self.base_url, STREAMING_API_PREFIX, external_id)
    }
}

#[async_trait]
impl ContentService for HttpContentService {
    async fn fetch_related(
        &self,
        external_id: &str,
        limit: usize,
    ) -> ContentResult<Vec<TrackCandidate>> {
        let url = format!("{}/related", self.stream_url(external_id));
        log::debug!("[Content] GET {} (limit {})", url, limit);

        let res = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(ContentError::HttpStatus(status.as_u16(), text));
        }

        let mut related: Vec<TrackCandidate> =
            serde_json::from_str(&text).map_err(|e| ContentError::Decode(e.to_string()))?;
        related.truncate(limit);
        Ok(related)
    }

    async fn request_warmup(&self, external_id: &str, priority: u8) -> ContentResult<()> {
        let url = format!("{}/prefetch", self.stream_url(external_id));
        let res = self
            .client
            .get(&url)
            .query(&[("priority", priority)])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(ContentError::HttpStatus(
                status.as_u16(),
                res.text().await.unwrap_or_default(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StreamResolver for HttpContentService {
    async fn resolve(&self, external_id: &str) -> ContentResult<StreamSource> {
        if external_id.is_empty() {
            return Err(ContentError::Unavailable("empty content id".to_string()));
        }
        Ok(StreamSource {
            external_id: external_id.to_string(),
            url: self.stream_url(external_id),
        })
    }
}
