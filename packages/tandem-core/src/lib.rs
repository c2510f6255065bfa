//! Tandem Core - shared party-session playback engine.
//!
//! One participant (the host) owns a play queue and publishes it to a session
//! store on a timer; guests pull that state, reconcile it into their local
//! queue and play along. When the queue runs low the host continues it with
//! related tracks staged in a hidden reserve.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`queue`]: Play queue, reserve and track types (pure, synchronous)
//! - [`playback`]: Playback driver over an abstract media output
//! - [`prefetch`]: Related-content prefetch, trickle and warm-up decisions
//! - [`sync`]: Session store trait, HTTP and in-memory stores, reconciliation
//! - [`session`]: The per-session actor loop and its handle
//! - [`signaling`]: Media controls, media keys and audio focus
//! - [`events`]: Event system for session observers
//! - [`api`]: HTTP relay serving the party API
//! - [`state`]: Configuration
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`SessionStore`](sync::SessionStore): Where session state is published
//! - [`ContentService`](content::ContentService) and
//!   [`StreamResolver`](content::StreamResolver): Related tracks and streams
//! - [`MediaOutput`](playback::MediaOutput): The audio element
//! - [`MediaControls`](signaling::MediaControls): OS media-session integration
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events
//!
//! Each trait ships with an implementation suitable for the headless node.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod content;
pub mod error;
pub mod events;
pub mod playback;
pub mod prefetch;
pub mod protocol_constants;
pub mod queue;
pub mod session;
pub mod signaling;
pub mod state;
pub mod sync;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{ErrorCode, TandemError, TandemResult};
pub use events::{
    BroadcastEventBridge, EventEmitter, LoggingEventEmitter, NoticeEvent, QueueEvent,
    SessionEvent, SyncEvent, TransportEvent,
};
pub use state::Config;
pub use utils::now_millis;

// Re-export queue and playback types
pub use playback::{MediaOutput, SimulatedOutput, TransportState};
pub use queue::{PlayQueue, QueueEffect, Track, TrackCandidate};

// Re-export session types
pub use session::{
    join, start_host, HostedSession, RoleKind, SessionDeps, SessionHandle, SessionView,
};
pub use signaling::{AudioFocusArbiter, MediaKey};

// Re-export store types
pub use sync::{HttpSessionStore, MemorySessionStore, SessionState, SessionStore};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_services_with_store, BootstrappedServices};

// Re-export API types
pub use api::{start_server, RelayState, ServerError};
