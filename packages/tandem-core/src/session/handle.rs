//! Imperative and reactive surface of a running session.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use super::role::RoleKind;
use crate::error::{TandemError, TandemResult};
use crate::events::{BroadcastEventBridge, SessionEvent};
use crate::playback::TransportState;
use crate::queue::{Track, TrackCandidate};
use crate::signaling::MediaKey;
use crate::sync::VoteTally;

type Reply<T> = oneshot::Sender<TandemResult<T>>;

/// Messages accepted by the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    Add(TrackCandidate),
    AddNext(TrackCandidate),
    Remove(String),
    Reorder { from: usize, to: usize },
    PlayAt(usize),
    Clear,
    Next,
    Previous,
    Play,
    Pause,
    Seek(Duration),
    Key(MediaKey),
    SetAutoContinue(bool),
    SetLocked(bool, Reply<()>),
    Elevate(String, Reply<()>),
    VoteSkip(Reply<VoteTally>),
    SaveReplay(Reply<()>),
    LoadReplay(Reply<usize>),
    End(Reply<()>),
}

/// Snapshot of everything a UI renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub role: RoleKind,
    pub queue: Vec<Track>,
    pub current_index: Option<usize>,
    pub transport: TransportState,
    /// Play intent (what the session wants), not the output state.
    pub is_playing: bool,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub reserve_size: usize,
    pub fetch_in_progress: bool,
    pub auto_continue: bool,
    pub is_locked: bool,
    /// Set once the host ended the session.
    pub ended: bool,
}

impl SessionView {
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.queue.get(i))
    }
}

/// Cloneable handle to a session task.
///
/// Dropping every handle stops the session, as does [`SessionHandle::shutdown`].
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    participant_id: String,
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    events: BroadcastEventBridge,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        session_id: String,
        participant_id: String,
        commands: mpsc::Sender<SessionCommand>,
        view: watch::Receiver<SessionView>,
        events: BroadcastEventBridge,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            session_id,
            participant_id,
            commands,
            view,
            events,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Anonymous id used for votes.
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Latest view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every view change.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Session events as a stream. Events missed by a slow consumer are
    /// skipped with a warning.
    pub fn event_stream(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!("[Session] Event stream lagged: {}", e);
                    None
                }
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queue
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn add(&self, track: TrackCandidate) -> TandemResult<()> {
        self.send(SessionCommand::Add(track)).await
    }

    pub async fn add_next(&self, track: TrackCandidate) -> TandemResult<()> {
        self.send(SessionCommand::AddNext(track)).await
    }

    pub async fn remove(&self, queue_instance_id: impl Into<String>) -> TandemResult<()> {
        self.send(SessionCommand::Remove(queue_instance_id.into()))
            .await
    }

    pub async fn reorder(&self, from: usize, to: usize) -> TandemResult<()> {
        self.send(SessionCommand::Reorder { from, to }).await
    }

    pub async fn play_at(&self, index: usize) -> TandemResult<()> {
        self.send(SessionCommand::PlayAt(index)).await
    }

    pub async fn clear(&self) -> TandemResult<()> {
        self.send(SessionCommand::Clear).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn next(&self) -> TandemResult<()> {
        self.send(SessionCommand::Next).await
    }

    pub async fn previous(&self) -> TandemResult<()> {
        self.send(SessionCommand::Previous).await
    }

    pub async fn play(&self) -> TandemResult<()> {
        self.send(SessionCommand::Play).await
    }

    pub async fn pause(&self) -> TandemResult<()> {
        self.send(SessionCommand::Pause).await
    }

    pub async fn seek(&self, position: Duration) -> TandemResult<()> {
        self.send(SessionCommand::Seek(position)).await
    }

    /// Delivers a media key press.
    pub async fn media_key(&self, key: MediaKey) -> TandemResult<()> {
        self.send(SessionCommand::Key(key)).await
    }

    pub async fn set_auto_continue(&self, enabled: bool) -> TandemResult<()> {
        self.send(SessionCommand::SetAutoContinue(enabled)).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    /// Locks or unlocks guest edits. Host only.
    pub async fn set_locked(&self, locked: bool) -> TandemResult<()> {
        self.request(|reply| SessionCommand::SetLocked(locked, reply))
            .await
    }

    /// Gains write authority by presenting the host credential.
    pub async fn elevate(&self, code: impl Into<String>) -> TandemResult<()> {
        let code = code.into();
        self.request(|reply| SessionCommand::Elevate(code, reply))
            .await
    }

    pub async fn vote_skip(&self) -> TandemResult<VoteTally> {
        self.request(SessionCommand::VoteSkip).await
    }

    pub async fn save_replay(&self) -> TandemResult<()> {
        self.request(SessionCommand::SaveReplay).await
    }

    /// Restores the replay snapshot of this session. Returns the track count.
    pub async fn load_replay(&self) -> TandemResult<usize> {
        self.request(SessionCommand::LoadReplay).await
    }

    /// Ends the session for everyone. Host only.
    pub async fn end(&self) -> TandemResult<()> {
        self.request(SessionCommand::End).await
    }

    /// Stops the session task and waits for it to clean up.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log::warn!("[Session] Task ended abnormally: {}", e);
            }
        }
    }

    /// Whether the session task is still running.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn send(&self, command: SessionCommand) -> TandemResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TandemError::SessionClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> SessionCommand) -> TandemResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| TandemError::SessionClosed)?
    }
}
