//! HTTP API layer: the session relay.
//!
//! Serves the party API over an in-memory session store so a node can host
//! sessions for its LAN. Handlers are thin and delegate to the store.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::sync::MemorySessionStore;

pub mod http;
pub mod response;

/// Errors that can occur when starting or running the relay.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared state for the relay handlers.
#[derive(Clone)]
pub struct RelayState {
    /// Session documents served by the relay.
    pub store: Arc<MemorySessionStore>,
}

impl RelayState {
    pub fn new(store: Arc<MemorySessionStore>) -> Self {
        Self { store }
    }
}

/// Binds the relay and serves it in the background until `cancel` fires.
///
/// Returns the bound address, which differs from `addr` when port 0 was
/// requested.
pub async fn start_server(
    state: RelayState,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<SocketAddr, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    log::info!("[Relay] Listening on http://{}", bound);

    let app = http::create_router(state);
    tokio::spawn(async move {
        let shutdown = cancel.cancelled_owned();
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            log::error!("[Relay] Server error: {}", e);
        }
        log::info!("[Relay] Stopped");
    });

    Ok(bound)
}
