//! General utilities shared across the crate.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Length of the shareable session code.
const SESSION_CODE_LEN: usize = 8;

/// Generates a fresh per-insertion queue id.
#[must_use]
pub fn new_instance_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a short, link-friendly session identifier (uppercase hex).
///
/// Short enough to read aloud; collisions are handled by the store rejecting
/// a duplicate `create_session`.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SESSION_CODE_LEN)
        .collect::<String>()
        .to_uppercase()
}

/// Generates a secret host credential.
#[must_use]
pub fn new_host_credential() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generates an anonymous participant id (used for skip votes).
#[must_use]
pub fn new_participant_id() -> String {
    Uuid::new_v4().to_string()
}
