//! State exchange between host, guests and the session store.
//!
//! The host pushes full snapshots on a timer; guests pull on a timer and run
//! [`reconcile`] over what they receive. Both directions go through the
//! [`SessionStore`] trait.

mod http;
mod memory;
mod reconcile;
mod store;
mod wire;

pub use http::{AddTrackRequest, HttpSessionStore};
pub use memory::MemorySessionStore;
pub use reconcile::{reconcile, Reconciliation};
pub use store::{SessionStore, StoreError, StoreResult};
pub use wire::{index_from_wire, index_to_wire, PushAck, SessionState, VoteTally};
