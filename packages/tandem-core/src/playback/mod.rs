//! Local playback.
//!
//! [`PlaybackDriver`] owns exactly one [`MediaOutput`] and turns the queue's
//! current track and the session's play intent into load/play/pause calls.

mod driver;
mod output;
mod simulated;

pub use driver::{DriverNotice, PlaybackDriver, TransportState};
pub use output::{
    LoadRequest, MediaError, MediaErrorKind, MediaEvent, MediaOutput, MediaResult, MediaSignal,
};
pub use simulated::SimulatedOutput;
