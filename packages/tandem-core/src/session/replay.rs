//! Single-slot replay snapshot persisted in the data directory.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::Track;

const REPLAY_FILE: &str = "replay.json";
const REPLAY_TEMP_FILE: &str = "replay.json.tmp";

/// Serializes every replay file operation in the process.
static REPLAY_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn replay_lock() -> &'static Mutex<()> {
    REPLAY_LOCK.get_or_init(|| Mutex::new(()))
}

/// Errors from saving or loading the replay snapshot.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Replay I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Replay file is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    /// No snapshot has been saved.
    #[error("No replay snapshot saved")]
    NotFound,

    /// The saved snapshot belongs to another session.
    #[error("Replay snapshot is for session {found}, not {expected}")]
    SessionMismatch { expected: String, found: String },

    /// Replay needs a data directory and none is configured.
    #[error("Data directory not configured")]
    NoDataDir,
}

/// What a replay snapshot records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    pub session_id: String,
    pub queue: Vec<Track>,
    /// Wire index (-1 for none).
    pub current_index: i64,
    /// Unix milliseconds.
    pub saved_at: u64,
}

/// Reads and writes `replay.json` in one directory.
#[derive(Debug, Clone)]
pub struct ReplayStore {
    dir: PathBuf,
}

impl ReplayStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(REPLAY_FILE)
    }

    /// Replaces the stored snapshot.
    ///
    /// Uses atomic write (temp file + rename) to prevent corruption on crash.
    /// Creates the directory if it doesn't exist.
    pub fn save(&self, snapshot: &ReplaySnapshot) -> Result<(), ReplayError> {
        let _guard = replay_lock().lock();
        std::fs::create_dir_all(&self.dir)?;
        let temp_path = self.dir.join(REPLAY_TEMP_FILE);
        let contents = serde_json::to_string_pretty(snapshot)?;

        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, self.path())?;
        log::info!(
            "[Replay] Saved {} track(s) for session {}",
            snapshot.queue.len(),
            snapshot.session_id
        );
        Ok(())
    }

    /// Loads the snapshot saved for `session_id`.
    pub fn load(&self, session_id: &str) -> Result<ReplaySnapshot, ReplayError> {
        let _guard = replay_lock().lock();
        let snapshot = read_snapshot(&self.path())?;
        if snapshot.session_id != session_id {
            return Err(ReplayError::SessionMismatch {
                expected: session_id.to_string(),
                found: snapshot.session_id,
            });
        }
        Ok(snapshot)
    }
}

fn read_snapshot(path: &Path) -> Result<ReplaySnapshot, ReplayError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ReplayError::NotFound),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&contents)?)
}
