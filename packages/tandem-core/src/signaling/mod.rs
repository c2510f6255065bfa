//! Hardware and external playback signaling.
//!
//! [`MediaControls`] mirrors the session into OS media controls and
//! [`MediaKey`] carries key presses back in. [`AudioFocusArbiter`] keeps a
//! single audio source active across sibling playback subsystems.

mod focus;
mod media_controls;

pub use focus::{AudioFocusArbiter, FocusHandle};
pub use media_controls::{LoggingMediaControls, MediaControls, MediaKey, NoopMediaControls};
