//! A running party session.
//!
//! [`start_host`] and [`join`] spawn the session loop and return a
//! [`SessionHandle`] for driving and observing it.

mod controller;
mod handle;
mod replay;
mod role;

pub use controller::{join, start_host, HostedSession, SessionDeps};
pub use handle::{SessionCommand, SessionHandle, SessionView};
pub use replay::{ReplayError, ReplaySnapshot, ReplayStore};
pub use role::{elevate, ElevationRefusal, Role, RoleKind};
