//! Session store client for the party HTTP API.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::store::{SessionStore, StoreError, StoreResult};
use super::wire::{PushAck, SessionState, VoteTally};
use crate::protocol_constants::PARTY_API_PREFIX;
use crate::queue::Track;

/// Body of `POST /api/party/{id}/add`.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct AddTrackRequest {
    pub action: String,
    pub track: Option<Track>,
}

/// [`SessionStore`] backed by a remote party API.
///
/// Speaks the wire shapes served by [`crate::api`]: tracks are keyed by
/// `external_id`. Servers that key tracks differently reject the pushed
/// queue; their datetime `updated_at` values are tolerated on pull.
#[derive(Clone)]
pub struct HttpSessionStore {
    client: Client,
    base_url: String,
}

impl HttpSessionStore {
    /// Creates a store rooted at `base_url` (scheme, host and port).
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, PARTY_API_PREFIX, path)
    }
}

/// Maps a party API response to a typed body or a [`StoreError`].
async fn decode<T: DeserializeOwned>(res: Response, session_id: &str) -> StoreResult<T> {
    let status = res.status();
    if !status.is_success() {
        return Err(status_error(status, session_id, res.text().await.unwrap_or_default()));
    }
    let text = res.text().await?;
    serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, session_id: &str, body: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(session_id.to_string()),
        StatusCode::FORBIDDEN => StoreError::WrongHost,
        StatusCode::CONFLICT => StoreError::SessionExists(session_id.to_string()),
        StatusCode::LOCKED => StoreError::Locked(session_id.to_string()),
        other => StoreError::HttpStatus(other.as_u16(), body),
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn create_session(
        &self,
        session_id: &str,
        host_credential: &str,
    ) -> StoreResult<SessionState> {
        let res = self
            .client
            .post(self.url("/create"))
            .query(&[("session_id", session_id), ("host_id", host_credential)])
            .send()
            .await?;
        decode(res, session_id).await
    }

    async fn get_session_state(&self, session_id: &str) -> StoreResult<SessionState> {
        let res = self
            .client
            .get(self.url(&format!("/{}", session_id)))
            .send()
            .await?;
        decode(res, session_id).await
    }

    async fn push_session_state(
        &self,
        session_id: &str,
        host_credential: &str,
        state: &SessionState,
    ) -> StoreResult<PushAck> {
        let res = self
            .client
            .post(self.url(&format!("/{}/sync", session_id)))
            .query(&[("host_id", host_credential)])
            .json(state)
            .send()
            .await?;
        decode(res, session_id).await
    }

    async fn end_session(&self, session_id: &str, host_credential: &str) -> StoreResult<()> {
        let res = self
            .client
            .delete(self.url(&format!("/{}", session_id)))
            .query(&[("host_id", host_credential)])
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(status_error(status, session_id, res.text().await.unwrap_or_default()));
        }
        Ok(())
    }

    async fn add_track(&self, session_id: &str, track: &Track) -> StoreResult<()> {
        let body = AddTrackRequest {
            action: "add".to_string(),
            track: Some(track.clone()),
        };
        let res = self
            .client
            .post(self.url(&format!("/{}/add", session_id)))
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(status_error(status, session_id, res.text().await.unwrap_or_default()));
        }
        Ok(())
    }

    async fn vote_skip(&self, session_id: &str, participant_id: &str) -> StoreResult<VoteTally> {
        let res = self
            .client
            .post(self.url(&format!("/{}/vote", session_id)))
            .query(&[("user_id", participant_id)])
            .send()
            .await?;
        decode(res, session_id).await
    }
}
