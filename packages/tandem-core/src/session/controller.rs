//! The session loop.
//!
//! One task owns the queue, the playback driver, the continuation engine
//! and the role. It reacts to handle commands, media events, the push/pull
//! timers and completion messages from the network tasks it spawns. Nothing
//! inside is shared behind a lock.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::handle::{SessionCommand, SessionHandle, SessionView};
use super::replay::{ReplayError, ReplaySnapshot, ReplayStore};
use super::role::{elevate, ElevationRefusal, Role};
use crate::content::{ContentResult, ContentService, StreamResolver};
use crate::error::{TandemError, TandemResult};
use crate::events::{
    BroadcastEventBridge, EventEmitter, NoticeEvent, QueueEvent, ReplayAction, SyncDirection,
    SyncEvent, TransportEvent,
};
use crate::playback::{
    DriverNotice, MediaError, MediaOutput, MediaResult, MediaSignal, PlaybackDriver,
    TransportState,
};
use crate::prefetch::{EndOfTrack, TrickleEngine, TrickleSettings};
use crate::protocol_constants::COMMAND_CHANNEL_CAPACITY;
use crate::queue::{PlayQueue, QueueEffect, Track, TrackCandidate};
use crate::signaling::{FocusHandle, MediaControls, MediaKey};
use crate::state::Config;
use crate::sync::{
    index_from_wire, index_to_wire, reconcile, PushAck, SessionState, SessionStore, StoreError,
    StoreResult, VoteTally,
};
use crate::utils::{new_host_credential, new_participant_id, new_session_id, now_millis};

/// Attempts at finding an unused session id before giving up.
const CREATE_ATTEMPTS: usize = 3;

/// Everything a session needs from the outside world.
pub struct SessionDeps {
    pub store: Arc<dyn SessionStore>,
    pub content: Arc<dyn ContentService>,
    pub resolver: Arc<dyn StreamResolver>,
    pub output: Arc<dyn MediaOutput>,
    /// Receiver for the events of `output`.
    pub media_events: mpsc::Receiver<MediaSignal>,
    pub controls: Arc<dyn MediaControls>,
    pub focus: Option<FocusHandle>,
    pub events: BroadcastEventBridge,
    /// Parent token; the session stops when it is cancelled.
    pub cancel: CancellationToken,
}

/// A freshly hosted session.
pub struct HostedSession {
    pub handle: SessionHandle,
    /// Secret that lets another participant elevate to host.
    pub credential: String,
}

/// Creates a new session in the store and starts it with the host role.
///
/// Returns [`TandemError::Configuration`] if `config` is invalid.
pub async fn start_host(config: &Config, deps: SessionDeps) -> TandemResult<HostedSession> {
    config.validate().map_err(TandemError::Configuration)?;
    let credential = new_host_credential();
    let mut session_id = new_session_id();
    let mut attempts = 1;

    loop {
        match deps.store.create_session(&session_id, &credential).await {
            Ok(_) => break,
            Err(StoreError::SessionExists(_)) if attempts < CREATE_ATTEMPTS => {
                attempts += 1;
                session_id = new_session_id();
            }
            Err(e) => return Err(e.into()),
        }
    }

    log::info!("[Session] Hosting session {}", session_id);
    let role = Role::Host {
        credential: credential.clone(),
    };
    let handle = launch(config, deps, session_id, role, None);
    Ok(HostedSession { handle, credential })
}

/// Joins an existing session as a guest.
///
/// Performs one pull before returning. On failure a `JoinFailed` notice is
/// emitted and nothing is started.
pub async fn join(config: &Config, deps: SessionDeps, session_id: &str) -> TandemResult<SessionHandle> {
    config.validate().map_err(TandemError::Configuration)?;
    match deps.store.get_session_state(session_id).await {
        Ok(state) => {
            log::info!(
                "[Session] Joined session {} ({} tracks)",
                session_id,
                state.queue.len()
            );
            Ok(launch(config, deps, session_id.to_string(), Role::Guest, Some(state)))
        }
        Err(e) => {
            log::warn!("[Session] Failed to join {}: {}", session_id, e);
            deps.events.emit_notice(NoticeEvent::JoinFailed {
                session_id: session_id.to_string(),
                reason: e.to_string(),
                timestamp: now_millis(),
            });
            Err(TandemError::JoinFailed(e.to_string()))
        }
    }
}

fn launch(
    config: &Config,
    deps: SessionDeps,
    session_id: String,
    role: Role,
    initial: Option<SessionState>,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let participant_id = new_participant_id();
    let cancel = deps.cancel.child_token();
    let events = deps.events.clone();

    let mut queue = PlayQueue::new();
    let mut driver = PlaybackDriver::new(deps.output, deps.resolver);
    let mut is_locked = false;
    let mut remote_host_id = None;
    if let Some(state) = &initial {
        queue.replace_tracks(state.queue.clone());
        queue.set_current(state.current());
        driver.set_intent(state.is_playing);
        is_locked = state.is_locked;
        remote_host_id = Some(state.host_id.clone());
    }

    let push_timer = role.is_host().then(|| push_timer(config));
    let pull_timer = (!role.is_host()).then(|| pull_timer(config));

    let initial_view = SessionView {
        session_id: session_id.clone(),
        role: role.kind(),
        queue: queue.tracks().to_vec(),
        current_index: queue.current_index(),
        transport: TransportState::Idle,
        is_playing: driver.wants_playing(),
        position_secs: 0.0,
        duration_secs: None,
        reserve_size: 0,
        fetch_in_progress: false,
        auto_continue: config.auto_continue,
        is_locked,
        ended: false,
    };
    let (view_tx, view_rx) = watch::channel(initial_view);

    let actor = SessionActor {
        session_id: session_id.clone(),
        participant_id: participant_id.clone(),
        role,
        queue,
        driver,
        engine: TrickleEngine::new(TrickleSettings::from(config), config.auto_continue),
        is_locked,
        ended: false,
        remote_host_id,
        store: deps.store,
        content: deps.content,
        controls: deps.controls,
        events: deps.events,
        focus: deps.focus,
        replay: config.data_dir.as_ref().map(ReplayStore::new),
        config: config.clone(),
        commands: cmd_rx,
        media_events: deps.media_events,
        internal_tx,
        internal_rx,
        push_timer,
        pull_timer,
        push_in_flight: false,
        pull_in_flight: false,
        view_tx,
        cancel: cancel.clone(),
        seen_queue: Vec::new(),
        seen_index: None,
        seen_transport: TransportState::Idle,
        announced: None,
        warmed: HashSet::new(),
    };

    let task = tokio::spawn(actor.run(initial.is_some()));
    SessionHandle::new(session_id, participant_id, cmd_tx, view_rx, events, cancel, task)
}

fn push_timer(config: &Config) -> Interval {
    let mut timer = interval(config.push_interval());
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

fn pull_timer(config: &Config) -> Interval {
    let period = config.pull_interval();
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn focus_revoked(focus: &mut Option<FocusHandle>) {
    match focus {
        Some(f) => f.revoked().await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

/// Completions from spawned network and timer tasks.
enum Internal {
    Pulled(StoreResult<SessionState>),
    Pushed(StoreResult<PushAck>),
    Related(ContentResult<Vec<TrackCandidate>>),
    Fallback(ContentResult<Vec<TrackCandidate>>),
    ContributionFailed(StoreError),
    Voted(StoreResult<VoteTally>, oneshot::Sender<TandemResult<VoteTally>>),
    Ended(StoreResult<()>, oneshot::Sender<TandemResult<()>>),
    /// Skip the failed track if it is still current.
    FatalSkip(String),
}

struct SessionActor {
    session_id: String,
    participant_id: String,
    role: Role,
    queue: PlayQueue,
    driver: PlaybackDriver,
    engine: TrickleEngine,
    is_locked: bool,
    ended: bool,
    /// Host id of the most recently pulled snapshot.
    remote_host_id: Option<String>,

    store: Arc<dyn SessionStore>,
    content: Arc<dyn ContentService>,
    controls: Arc<dyn MediaControls>,
    events: BroadcastEventBridge,
    focus: Option<FocusHandle>,
    replay: Option<ReplayStore>,
    config: Config,

    commands: mpsc::Receiver<SessionCommand>,
    media_events: mpsc::Receiver<MediaSignal>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    push_timer: Option<Interval>,
    pull_timer: Option<Interval>,
    push_in_flight: bool,
    pull_in_flight: bool,
    view_tx: watch::Sender<SessionView>,
    cancel: CancellationToken,

    // Change detection for events and media controls
    seen_queue: Vec<String>,
    seen_index: Option<usize>,
    seen_transport: TransportState,
    announced: Option<String>,
    /// Content ids already sent for warm-up.
    warmed: HashSet<String>,
}

impl SessionActor {
    async fn run(mut self, joined: bool) {
        if joined {
            // Start local playback where the host is.
            self.apply(QueueEffect::Continue).await;
        }
        self.publish();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some(signal) = self.media_events.recv() => self.handle_media(signal).await,

                Some(msg) = self.internal_rx.recv() => self.handle_internal(msg).await,

                _ = tick(&mut self.push_timer) => self.push(),

                _ = tick(&mut self.pull_timer) => self.pull(),

                _ = focus_revoked(&mut self.focus) => self.on_focus_lost().await,
            }

            self.publish();
        }

        self.teardown().await;
    }

    async fn teardown(&mut self) {
        log::info!("[Session] Stopping session {}", self.session_id);
        if let Err(e) = self.driver.stop().await {
            log::debug!("[Session] Output stop failed during teardown: {}", e);
        }
        self.controls.update_metadata(None);
        self.controls.set_playback_status(TransportState::Idle);
        if let Some(mut focus) = self.focus.take() {
            focus.release();
        }
        self.push_timer = None;
        self.pull_timer = None;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Add(candidate) => self.add(candidate, false).await,
            SessionCommand::AddNext(candidate) => self.add(candidate, true).await,
            SessionCommand::Remove(id) => {
                if !self.refuse_locked() {
                    let effect = self.queue.remove(&id);
                    self.apply(effect).await;
                }
            }
            SessionCommand::Reorder { from, to } => {
                if !self.refuse_locked() {
                    self.queue.reorder(from, to);
                }
            }
            SessionCommand::PlayAt(index) => {
                if !self.refuse_locked() {
                    let effect = self.queue.play_at(index);
                    self.apply(effect).await;
                }
            }
            SessionCommand::Clear => {
                if !self.refuse_locked() {
                    let effect = self.queue.clear();
                    self.reset_continuation();
                    self.apply(effect).await;
                }
            }
            SessionCommand::Next => self.skip_forward().await,
            SessionCommand::Previous => self.skip_backward().await,
            SessionCommand::Play => self.play().await,
            SessionCommand::Pause => self.pause().await,
            SessionCommand::Seek(position) => {
                let result = self.driver.seek(position).await;
                self.media_result(result);
            }
            SessionCommand::Key(key) => self.media_key(key).await,
            SessionCommand::SetAutoContinue(enabled) => {
                log::info!("[Session] Auto-continue {}", if enabled { "on" } else { "off" });
                self.engine.set_auto_continue(enabled);
            }
            SessionCommand::SetLocked(locked, reply) => {
                let result = if self.role.is_host() {
                    self.is_locked = locked;
                    Ok(())
                } else {
                    Err(TandemError::NotHost("lock".to_string()))
                };
                let _ = reply.send(result);
            }
            SessionCommand::Elevate(code, reply) => {
                let _ = reply.send(self.elevate(&code));
            }
            SessionCommand::VoteSkip(reply) => self.vote_skip(reply),
            SessionCommand::SaveReplay(reply) => {
                let _ = reply.send(self.save_replay());
            }
            SessionCommand::LoadReplay(reply) => {
                let result = self.load_replay().await;
                let _ = reply.send(result);
            }
            SessionCommand::End(reply) => self.end(reply),
        }
    }

    async fn add(&mut self, candidate: TrackCandidate, next: bool) {
        if self.refuse_locked() {
            return;
        }

        let (track, effect) = if next {
            self.queue.add_next(candidate)
        } else {
            self.queue.add(candidate)
        };
        self.apply(effect).await;

        if self.role.is_host() {
            if let Some(id) = self.engine.on_user_add(&track, self.driver.wants_playing()) {
                self.spawn_related(id);
            }
        } else {
            self.spawn_contribution(track);
        }
    }

    async fn play(&mut self) {
        if self.queue.current_index().is_none() {
            let effect = self.queue.next();
            self.apply(effect).await;
            return;
        }
        self.set_intent(true);
        let result = self.driver.show(self.queue.current_track()).await;
        self.media_result(result);
    }

    async fn pause(&mut self) {
        let result = self.driver.set_playing(false).await;
        self.media_result(result);
    }

    async fn skip_forward(&mut self) {
        let continues = self.role.is_host() && self.engine.auto_continue();
        if self.queue.has_next() || !continues {
            let effect = self.queue.next();
            self.apply(effect).await;
        } else {
            self.advance().await;
        }
    }

    async fn skip_backward(&mut self) {
        match self.queue.previous() {
            QueueEffect::None => {
                let result = self.driver.restart().await;
                self.media_result(result);
            }
            effect => self.apply(effect).await,
        }
    }

    async fn media_key(&mut self, key: MediaKey) {
        log::debug!("[Session] Media key {:?}", key);
        match key {
            MediaKey::Play => self.play().await,
            MediaKey::Pause => self.pause().await,
            MediaKey::Toggle => {
                if self.driver.wants_playing() {
                    self.pause().await;
                } else {
                    self.play().await;
                }
            }
            MediaKey::Next => self.skip_forward().await,
            MediaKey::Previous => self.skip_backward().await,
            MediaKey::Stop => {
                self.driver.set_intent(false);
                let result = self.driver.stop().await;
                self.media_result(result);
            }
        }
    }

    fn refuse_locked(&self) -> bool {
        if self.is_locked && !self.role.is_host() {
            log::info!("[Session] Refusing queue edit: session is locked");
            self.events.emit_notice(NoticeEvent::SessionLocked {
                timestamp: now_millis(),
            });
            return true;
        }
        false
    }

    fn elevate(&mut self, code: &str) -> TandemResult<()> {
        match elevate(&self.role, self.remote_host_id.as_deref(), code) {
            Ok(role) => {
                if !self.role.is_host() {
                    log::info!("[Session] Elevated to host in {}", self.session_id);
                    self.role = role;
                    self.pull_timer = None;
                    self.push_timer = Some(push_timer(&self.config));
                    self.events.emit_sync(SyncEvent::Elevated {
                        session_id: self.session_id.clone(),
                        timestamp: now_millis(),
                    });
                }
                Ok(())
            }
            Err(refusal) => {
                let reason = match refusal {
                    ElevationRefusal::NoRemoteState => "no session state pulled yet",
                    ElevationRefusal::WrongCode => "wrong host code",
                };
                self.events.emit_notice(NoticeEvent::ElevationRefused {
                    reason: reason.to_string(),
                    timestamp: now_millis(),
                });
                match refusal {
                    ElevationRefusal::NoRemoteState => {
                        Err(TandemError::InvalidRequest(reason.to_string()))
                    }
                    ElevationRefusal::WrongCode => Err(TandemError::WrongHost),
                }
            }
        }
    }

    fn save_replay(&mut self) -> TandemResult<()> {
        let store = self.replay.as_ref().ok_or(ReplayError::NoDataDir)?;
        let snapshot = ReplaySnapshot {
            session_id: self.session_id.clone(),
            queue: self.queue.tracks().to_vec(),
            current_index: index_to_wire(self.queue.current_index()),
            saved_at: now_millis(),
        };
        store.save(&snapshot)?;
        self.events.emit_notice(NoticeEvent::Replay {
            action: ReplayAction::Saved,
            session_id: self.session_id.clone(),
            tracks: snapshot.queue.len(),
            timestamp: now_millis(),
        });
        Ok(())
    }

    async fn load_replay(&mut self) -> TandemResult<usize> {
        let store = self.replay.as_ref().ok_or(ReplayError::NoDataDir)?;
        let snapshot = store.load(&self.session_id)?;
        let count = snapshot.queue.len();

        self.queue.replace_tracks(snapshot.queue);
        self.queue
            .set_current(index_from_wire(snapshot.current_index, self.queue.len()));
        self.reset_continuation();
        self.apply(QueueEffect::Continue).await;

        log::info!("[Session] Restored {} track(s) from replay", count);
        self.events.emit_notice(NoticeEvent::Replay {
            action: ReplayAction::Restored,
            session_id: self.session_id.clone(),
            tracks: count,
            timestamp: now_millis(),
        });
        Ok(count)
    }

    fn end(&mut self, reply: oneshot::Sender<TandemResult<()>>) {
        let Role::Host { credential } = &self.role else {
            let _ = reply.send(Err(TandemError::NotHost("end".to_string())));
            return;
        };

        self.push_timer = None;
        let store = Arc::clone(&self.store);
        let tx = self.internal_tx.clone();
        let session_id = self.session_id.clone();
        let credential = credential.clone();
        tokio::spawn(async move {
            let result = store.end_session(&session_id, &credential).await;
            let _ = tx.send(Internal::Ended(result, reply));
        });
    }

    fn vote_skip(&mut self, reply: oneshot::Sender<TandemResult<VoteTally>>) {
        let store = Arc::clone(&self.store);
        let tx = self.internal_tx.clone();
        let session_id = self.session_id.clone();
        let participant_id = self.participant_id.clone();
        tokio::spawn(async move {
            let result = store.vote_skip(&session_id, &participant_id).await;
            let _ = tx.send(Internal::Voted(result, reply));
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playback
    // ─────────────────────────────────────────────────────────────────────────

    /// Sets the play intent, taking audio focus when it turns on.
    fn set_intent(&mut self, playing: bool) {
        if playing {
            if let Some(focus) = self.focus.as_mut() {
                focus.acquire();
            }
        }
        self.driver.set_intent(playing);
    }

    /// Hands a queue effect to the driver.
    async fn apply(&mut self, effect: QueueEffect) {
        let result = match effect {
            QueueEffect::None => return,
            QueueEffect::Play => {
                self.set_intent(true);
                self.driver.show(self.queue.current_track()).await
            }
            QueueEffect::Continue => {
                let playing = self.driver.wants_playing();
                self.set_intent(playing);
                self.driver.show(self.queue.current_track()).await
            }
            QueueEffect::Stop => {
                self.driver.set_intent(false);
                self.driver.show(None).await
            }
        };
        self.media_result(result);
    }

    fn media_result(&mut self, result: MediaResult<()>) {
        if let Err(err) = result {
            if let Some(DriverNotice::Fatal(err)) = self.driver.absorb(err) {
                self.on_fatal(err);
            }
        }
    }

    fn on_fatal(&mut self, err: MediaError) {
        let Some(track) = self.queue.current_track() else {
            return;
        };
        self.events.emit_notice(NoticeEvent::PlaybackFailed {
            external_id: track.external_id.clone(),
            message: err.message.clone(),
            timestamp: now_millis(),
        });

        let failed = track.queue_instance_id.clone();
        let delay = self.config.fatal_skip_delay();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::FatalSkip(failed));
        });
    }

    async fn handle_media(&mut self, signal: MediaSignal) {
        match self.driver.handle_signal(signal) {
            Some(DriverNotice::Ended) => self.advance().await,
            Some(DriverNotice::Fatal(err)) => self.on_fatal(err),
            None => {
                self.controls
                    .set_timeline(self.driver.position(), self.driver.duration());
                if self.role.is_host() {
                    if let Some(progress) = self.driver.progress() {
                        let moved = self.engine.on_progress(&mut self.queue, progress);
                        if !moved.is_empty() {
                            self.events.emit_queue(QueueEvent::Trickled {
                                count: moved.len(),
                                timestamp: now_millis(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Continues after the current track ended or was skipped.
    async fn advance(&mut self) {
        if !self.role.is_host() {
            // The host's next snapshot decides; follow locally when possible.
            let effect = self.queue.next();
            self.apply(effect).await;
            return;
        }

        loop {
            match self.engine.on_track_end(&self.queue) {
                EndOfTrack::Advance => {
                    let effect = self.queue.next();
                    self.apply(effect).await;
                }
                EndOfTrack::Replenish => {
                    let moved = self.queue.trickle(self.engine.settings().batch);
                    if moved.is_empty() {
                        // Every staged track was already queued; reserve is now empty.
                        continue;
                    }
                    self.events.emit_queue(QueueEvent::Trickled {
                        count: moved.len(),
                        timestamp: now_millis(),
                    });
                    let effect = self.queue.next();
                    self.apply(effect).await;
                }
                EndOfTrack::FetchRelated(external_id) => self.spawn_fallback(external_id),
                EndOfTrack::AwaitingFallback => {
                    log::debug!("[Session] End-of-queue fetch already outstanding");
                }
                EndOfTrack::Exhausted => self.exhausted().await,
            }
            return;
        }
    }

    /// Forgets prefetch and warm-up bookkeeping for a cleared or replaced queue.
    fn reset_continuation(&mut self) {
        self.engine.reset();
        self.warmed.clear();
    }

    async fn exhausted(&mut self) {
        log::info!("[Session] Queue exhausted");
        self.events.emit_notice(NoticeEvent::QueueExhausted {
            timestamp: now_millis(),
        });
        let result = self.driver.set_playing(false).await;
        self.media_result(result);
    }

    async fn on_focus_lost(&mut self) {
        log::info!("[Session] Audio focus lost; pausing");
        self.events.emit_notice(NoticeEvent::FocusLost {
            timestamp: now_millis(),
        });
        self.pause().await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background work
    // ─────────────────────────────────────────────────────────────────────────

    fn spawn_related(&self, external_id: String) {
        let content = Arc::clone(&self.content);
        let tx = self.internal_tx.clone();
        let limit = self.engine.settings().related_limit;
        tokio::spawn(async move {
            let result = content.fetch_related(&external_id, limit).await;
            let _ = tx.send(Internal::Related(result));
        });
    }

    fn spawn_fallback(&self, external_id: String) {
        log::info!(
            "[Session] End of queue; fetching related tracks for {}",
            external_id
        );
        let content = Arc::clone(&self.content);
        let tx = self.internal_tx.clone();
        let limit = self.engine.settings().related_limit;
        tokio::spawn(async move {
            let result = content.fetch_related(&external_id, limit).await;
            let _ = tx.send(Internal::Fallback(result));
        });
    }

    fn spawn_contribution(&self, track: Track) {
        let store = Arc::clone(&self.store);
        let tx = self.internal_tx.clone();
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = store.add_track(&session_id, &track).await {
                let _ = tx.send(Internal::ContributionFailed(e));
            }
        });
    }

    fn warm_up(&mut self) {
        let priority = self.engine.settings().warmup_priority;
        for external_id in self.engine.warmup_targets(&self.queue) {
            if !self.warmed.insert(external_id.clone()) {
                continue;
            }
            let content = Arc::clone(&self.content);
            tokio::spawn(async move {
                if let Err(e) = content.request_warmup(&external_id, priority).await {
                    log::debug!("[Session] Warm-up of {} failed: {}", external_id, e);
                }
            });
        }
    }

    fn push(&mut self) {
        let Role::Host { credential } = &self.role else {
            return;
        };
        if self.push_in_flight {
            return;
        }
        self.push_in_flight = true;

        let state = SessionState {
            session_id: self.session_id.clone(),
            host_id: credential.clone(),
            queue: self.queue.tracks().to_vec(),
            current_index: index_to_wire(self.queue.current_index()),
            is_playing: self.driver.wants_playing(),
            is_locked: self.is_locked,
            updated_at: now_millis(),
        };
        let store = Arc::clone(&self.store);
        let tx = self.internal_tx.clone();
        let credential = credential.clone();
        tokio::spawn(async move {
            let result = store
                .push_session_state(&state.session_id, &credential, &state)
                .await;
            let _ = tx.send(Internal::Pushed(result));
        });
    }

    fn pull(&mut self) {
        if self.role.is_host() || self.ended || self.pull_in_flight {
            return;
        }
        self.pull_in_flight = true;

        let store = Arc::clone(&self.store);
        let tx = self.internal_tx.clone();
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            let result = store.get_session_state(&session_id).await;
            let _ = tx.send(Internal::Pulled(result));
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Completions
    // ─────────────────────────────────────────────────────────────────────────

    async fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::Pulled(result) => {
                self.pull_in_flight = false;
                self.on_pulled(result).await;
            }
            Internal::Pushed(result) => {
                self.push_in_flight = false;
                self.on_pushed(result).await;
            }
            Internal::Related(Ok(candidates)) => {
                let size = self.engine.on_related(&mut self.queue, candidates);
                self.events.emit_queue(QueueEvent::ReserveStaged {
                    size,
                    timestamp: now_millis(),
                });
                self.warm_up();
            }
            Internal::Related(Err(e)) => {
                log::warn!("[Session] Related fetch failed: {}", e);
                self.engine.on_fetch_failed();
            }
            Internal::Fallback(result) => {
                let candidates = result.unwrap_or_else(|e| {
                    log::warn!("[Session] End-of-queue fetch failed: {}", e);
                    Vec::new()
                });
                let outcome = self.engine.on_fallback(&mut self.queue, candidates);
                match (outcome.resume, outcome.appended.is_empty()) {
                    (true, true) => self.exhausted().await,
                    (true, false) => {
                        let effect = self.queue.next();
                        self.apply(effect).await;
                    }
                    // The user picked another track while the fetch was out.
                    (false, _) => log::debug!(
                        "[Session] Appended {} related track(s) without skipping",
                        outcome.appended.len()
                    ),
                }
            }
            Internal::ContributionFailed(e) => {
                log::warn!("[Session] Contribution rejected: {}", e);
                if matches!(e, StoreError::Locked(_)) {
                    self.events.emit_notice(NoticeEvent::SessionLocked {
                        timestamp: now_millis(),
                    });
                }
                self.emit_sync_failure(SyncDirection::Push, &e);
            }
            Internal::Voted(result, reply) => {
                let result = result.map_err(TandemError::from);
                if let Ok(tally) = &result {
                    self.events.emit_notice(NoticeEvent::VoteCast {
                        votes: tally.votes,
                        threshold: tally.threshold,
                        should_skip: tally.should_skip,
                        timestamp: now_millis(),
                    });
                }
                let _ = reply.send(result);
            }
            Internal::Ended(result, reply) => {
                let result = result.map_err(TandemError::from);
                if result.is_ok() {
                    self.ended = true;
                    self.events.emit_notice(NoticeEvent::SessionEnded {
                        session_id: self.session_id.clone(),
                        timestamp: now_millis(),
                    });
                } else if self.role.is_host() {
                    self.push_timer = Some(push_timer(&self.config));
                }
                let _ = reply.send(result);
            }
            Internal::FatalSkip(failed) => {
                let still_current = self
                    .queue
                    .current_track()
                    .is_some_and(|t| t.queue_instance_id == failed);
                if still_current {
                    self.advance().await;
                }
            }
        }
    }

    async fn on_pulled(&mut self, result: StoreResult<SessionState>) {
        if self.role.is_host() || self.ended {
            return;
        }

        let state = match result {
            Ok(state) => state,
            Err(StoreError::NotFound(_)) => {
                log::info!("[Session] Session {} was ended by the host", self.session_id);
                self.ended = true;
                self.pull_timer = None;
                self.events.emit_notice(NoticeEvent::SessionEnded {
                    session_id: self.session_id.clone(),
                    timestamp: now_millis(),
                });
                return;
            }
            Err(e) => {
                self.emit_sync_failure(SyncDirection::Pull, &e);
                return;
            }
        };

        self.remote_host_id = Some(state.host_id.clone());
        let outcome = reconcile(
            &mut self.queue,
            self.driver.wants_playing(),
            self.is_locked,
            &state,
        );

        if let Some(locked) = outcome.is_locked {
            self.is_locked = locked;
        }
        if let Some(playing) = outcome.is_playing {
            self.set_intent(playing);
        }
        if outcome.queue_replaced {
            self.reset_continuation();
        }
        if outcome.queue_replaced || outcome.index_changed || outcome.is_playing.is_some() {
            self.apply(QueueEffect::Continue).await;
        }

        self.events.emit_sync(SyncEvent::Pulled {
            session_id: self.session_id.clone(),
            queue_replaced: outcome.queue_replaced,
            timestamp: now_millis(),
        });
    }

    async fn on_pushed(&mut self, result: StoreResult<PushAck>) {
        let ack = match result {
            Ok(ack) => ack,
            Err(e) => {
                self.emit_sync_failure(SyncDirection::Push, &e);
                return;
            }
        };

        self.events.emit_sync(SyncEvent::Pushed {
            session_id: self.session_id.clone(),
            contributions: ack.contributions.len(),
            timestamp: now_millis(),
        });

        if !ack.contributions.is_empty() {
            log::info!(
                "[Session] Appending {} guest contribution(s)",
                ack.contributions.len()
            );
            let effect = self.queue.append_contributions(ack.contributions);
            self.apply(effect).await;
        }
        if ack.skip_requested {
            log::info!("[Session] Skip vote passed");
            self.skip_forward().await;
        }
    }

    fn emit_sync_failure(&self, direction: SyncDirection, err: &StoreError) {
        if err.is_transient() {
            log::debug!("[Session] {:?} failed (transient): {}", direction, err);
        } else {
            log::warn!("[Session] {:?} failed: {}", direction, err);
        }
        self.events.emit_sync(SyncEvent::Failed {
            direction,
            error: err.to_string(),
            timestamp: now_millis(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────

    /// Emits change events and refreshes the watched view.
    fn publish(&mut self) {
        let queue_ids: Vec<String> = self
            .queue
            .tracks()
            .iter()
            .map(|t| t.queue_instance_id.clone())
            .collect();
        let index = self.queue.current_index();

        if queue_ids != self.seen_queue || index != self.seen_index {
            self.seen_queue = queue_ids;
            self.seen_index = index;
            self.events.emit_queue(QueueEvent::Changed {
                session_id: self.session_id.clone(),
                length: self.queue.len(),
                current_index: index_to_wire(index),
                timestamp: now_millis(),
            });
            if self.role.is_host() {
                self.warm_up();
            }
        }

        let current = self.queue.current_track();
        let current_id = current.map(|t| t.queue_instance_id.clone());
        if current_id != self.announced {
            if let Some(track) = current {
                self.events.emit_transport(TransportEvent::TrackChanged {
                    queue_instance_id: track.queue_instance_id.clone(),
                    external_id: track.external_id.clone(),
                    title: track.title.clone(),
                    timestamp: now_millis(),
                });
            }
            self.controls.update_metadata(current);
            self.announced = current_id;
        }

        let transport = self.driver.state();
        if transport != self.seen_transport {
            self.seen_transport = transport;
            self.events.emit_transport(TransportEvent::StateChanged {
                state: transport,
                timestamp: now_millis(),
            });
            self.controls.set_playback_status(transport);
        }

        let view = SessionView {
            session_id: self.session_id.clone(),
            role: self.role.kind(),
            queue: self.queue.tracks().to_vec(),
            current_index: index,
            transport,
            is_playing: self.driver.wants_playing(),
            position_secs: self.driver.position().as_secs_f64(),
            duration_secs: self.driver.duration().map(|d| d.as_secs_f64()),
            reserve_size: self.queue.reserve().len(),
            fetch_in_progress: self.engine.fetch_in_progress(),
            auto_continue: self.engine.auto_continue(),
            is_locked: self.is_locked,
            ended: self.ended,
        };
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use tokio::sync::broadcast;

    use super::*;
    use crate::content::StreamSource;
    use crate::events::SessionEvent;
    use crate::playback::{MediaErrorKind, SimulatedOutput};
    use crate::session::RoleKind;
    use crate::signaling::{AudioFocusArbiter, NoopMediaControls};
    use crate::sync::MemorySessionStore;

    #[derive(Default)]
    struct FakeContent {
        related: Mutex<HashMap<String, Vec<TrackCandidate>>>,
        warmed: Mutex<Vec<String>>,
        latency: Mutex<Duration>,
    }

    impl FakeContent {
        fn with_related(id: &str, related: Vec<TrackCandidate>) -> Arc<Self> {
            let content = Self::default();
            content.related.lock().insert(id.to_string(), related);
            Arc::new(content)
        }
    }

    #[async_trait]
    impl ContentService for FakeContent {
        async fn fetch_related(
            &self,
            external_id: &str,
            limit: usize,
        ) -> ContentResult<Vec<TrackCandidate>> {
            let latency = *self.latency.lock();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let mut related = self
                .related
                .lock()
                .get(external_id)
                .cloned()
                .unwrap_or_default();
            related.truncate(limit);
            Ok(related)
        }

        async fn request_warmup(&self, external_id: &str, _priority: u8) -> ContentResult<()> {
            self.warmed.lock().push(external_id.to_string());
            Ok(())
        }
    }

    struct SimResolver;

    #[async_trait]
    impl StreamResolver for SimResolver {
        async fn resolve(&self, external_id: &str) -> ContentResult<StreamSource> {
            Ok(StreamSource {
                external_id: external_id.to_string(),
                url: format!("sim://{external_id}"),
            })
        }
    }

    struct Rig {
        deps: SessionDeps,
        output: Arc<SimulatedOutput>,
        events: broadcast::Receiver<SessionEvent>,
    }

    fn rig(store: &Arc<MemorySessionStore>, content: Arc<FakeContent>) -> Rig {
        let (output, media_events) = SimulatedOutput::channel(64);
        let output = Arc::new(output);
        let events = BroadcastEventBridge::new(256);
        let rx = events.subscribe();
        let deps = SessionDeps {
            store: Arc::clone(store) as Arc<dyn SessionStore>,
            content,
            resolver: Arc::new(SimResolver),
            output: Arc::clone(&output) as Arc<dyn MediaOutput>,
            media_events,
            controls: Arc::new(NoopMediaControls),
            focus: None,
            events,
            cancel: CancellationToken::new(),
        };
        Rig {
            deps,
            output,
            events: rx,
        }
    }

    fn song(id: &str, secs: u32) -> TrackCandidate {
        TrackCandidate::new(id, format!("Song {id}"), "Band").with_duration(secs)
    }

    async fn wait_for(
        handle: &SessionHandle,
        pred: impl FnMut(&SessionView) -> bool,
    ) -> SessionView {
        let mut rx = handle.watch();
        let view = tokio::time::timeout(Duration::from_secs(120), rx.wait_for(pred))
            .await
            .expect("timed out waiting for view")
            .expect("session stopped")
            .clone();
        view
    }

    async fn wait_notice(
        rx: &mut broadcast::Receiver<SessionEvent>,
        pred: impl Fn(&NoticeEvent) -> bool,
    ) -> NoticeEvent {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::Notice(notice)) if pred(&notice) => return notice,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(e) => panic!("event stream closed: {e}"),
                }
            }
        })
        .await
        .expect("timed out waiting for notice")
    }

    fn current_id(view: &SessionView) -> Option<&str> {
        view.current_track().map(|t| t.external_id.as_str())
    }

    #[tokio::test(start_paused = true)]
    async fn add_to_empty_queue_starts_playback() {
        let store = Arc::new(MemorySessionStore::new());
        let rig = rig(&store, Arc::new(FakeContent::default()));
        let output = Arc::clone(&rig.output);
        let hosted = start_host(&Config::default(), rig.deps).await.unwrap();

        hosted.handle.add(song("a", 60)).await.unwrap();

        let view = wait_for(&hosted.handle, |v| v.transport == TransportState::Playing).await;
        assert_eq!(view.role, RoleKind::Host);
        assert_eq!(view.current_index, Some(0));
        assert!(view.is_playing);
        assert!(output.is_playing());
        assert_eq!(store.len(), 1);

        hosted.handle.shutdown().await;
        assert!(!output.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn event_stream_reports_track_changes() {
        let store = Arc::new(MemorySessionStore::new());
        let rig = rig(&store, Arc::new(FakeContent::default()));
        let hosted = start_host(&Config::default(), rig.deps).await.unwrap();
        let mut events = Box::pin(hosted.handle.event_stream());

        hosted.handle.add(song("a", 60)).await.unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(event) = events.next().await {
                if let SessionEvent::Transport(TransportEvent::TrackChanged { external_id, .. }) =
                    event
                {
                    return external_id;
                }
            }
            panic!("event stream ended");
        })
        .await
        .unwrap();
        assert_eq!(changed, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn related_tracks_are_trickled_before_the_queue_runs_out() {
        let store = Arc::new(MemorySessionStore::new());
        let content = FakeContent::with_related("a", vec![song("b", 10), song("c", 10)]);
        let rig = rig(&store, Arc::clone(&content));
        let hosted = start_host(&Config::default(), rig.deps).await.unwrap();

        hosted.handle.add(song("a", 10)).await.unwrap();

        let view = wait_for(&hosted.handle, |v| v.queue.len() == 3).await;
        let ids: Vec<_> = view.queue.iter().map(|t| t.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let view = wait_for(&hosted.handle, |v| current_id(v) == Some("b")).await;
        assert!(view.is_playing);
        assert!(content.warmed.lock().contains(&"b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reserve_falls_back_to_related_of_last_track() {
        let store = Arc::new(MemorySessionStore::new());
        let content = FakeContent::with_related("a", vec![song("d", 10), song("e", 10)]);
        let rig = rig(&store, content);
        let hosted = start_host(&Config::default(), rig.deps).await.unwrap();
        let handle = hosted.handle;

        // No prefetch on add, so the reserve stays empty.
        handle.set_auto_continue(false).await.unwrap();
        handle.add(song("a", 10)).await.unwrap();
        wait_for(&handle, |v| v.transport == TransportState::Playing).await;
        handle.set_auto_continue(true).await.unwrap();

        let view = wait_for(&handle, |v| current_id(v) == Some("d")).await;
        assert_eq!(view.queue.len(), 3);
        assert_eq!(view.current_index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_skip_at_queue_end_waits_for_one_fetch() {
        let store = Arc::new(MemorySessionStore::new());
        let content = FakeContent::with_related("a", vec![song("d", 30), song("e", 30)]);
        *content.latency.lock() = Duration::from_millis(500);
        let mut rig = rig(&store, content);
        let hosted = start_host(&Config::default(), rig.deps).await.unwrap();
        let handle = hosted.handle;

        handle.set_auto_continue(false).await.unwrap();
        handle.add(song("a", 30)).await.unwrap();
        wait_for(&handle, |v| v.transport == TransportState::Playing).await;
        handle.set_auto_continue(true).await.unwrap();

        handle.next().await.unwrap();
        handle.next().await.unwrap();

        let view = wait_for(&handle, |v| current_id(v) == Some("d")).await;
        assert_eq!(view.queue.len(), 3);
        tokio::time::sleep(Duration::from_secs(2)).await;

        let view = handle.view();
        assert_eq!(current_id(&view), Some("d"));
        assert!(view.is_playing);
        assert_eq!(view.transport, TransportState::Playing);
        while let Ok(event) = rig.events.try_recv() {
            assert!(
                !matches!(event, SessionEvent::Notice(NoticeEvent::QueueExhausted { .. })),
                "queue reported exhausted after related tracks were appended"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn end_of_queue_fetch_does_not_override_picked_track() {
        let store = Arc::new(MemorySessionStore::new());
        let content = FakeContent::with_related("b", vec![song("d", 30)]);
        *content.latency.lock() = Duration::from_millis(500);
        let rig = rig(&store, content);
        let config = Config {
            auto_continue: false,
            ..Config::default()
        };
        let hosted = start_host(&config, rig.deps).await.unwrap();
        let handle = hosted.handle;

        handle.add(song("a", 30)).await.unwrap();
        handle.add(song("b", 30)).await.unwrap();
        handle.play_at(1).await.unwrap();
        wait_for(&handle, |v| current_id(v) == Some("b")).await;
        handle.set_auto_continue(true).await.unwrap();

        handle.next().await.unwrap();
        handle.play_at(0).await.unwrap();

        let view = wait_for(&handle, |v| v.queue.len() == 3).await;
        assert_eq!(current_id(&view), Some("a"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(current_id(&handle.view()), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_rejected_before_starting() {
        let store = Arc::new(MemorySessionStore::new());
        let config = Config {
            push_interval_secs: 0,
            ..Config::default()
        };

        let host_rig = rig(&store, Arc::new(FakeContent::default()));
        let result = start_host(&config, host_rig.deps).await;
        assert!(matches!(result, Err(TandemError::Configuration(_))));
        assert!(store.is_empty());

        let guest_rig = rig(&store, Arc::new(FakeContent::default()));
        let result = join(&config, guest_rig.deps, "ABCD1234").await;
        assert!(matches!(result, Err(TandemError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn queue_exhausts_without_auto_continue() {
        let store = Arc::new(MemorySessionStore::new());
        let mut rig = rig(&store, Arc::new(FakeContent::default()));
        let config = Config {
            auto_continue: false,
            ..Config::default()
        };
        let hosted = start_host(&config, rig.deps).await.unwrap();

        hosted.handle.add(song("a", 5)).await.unwrap();

        wait_notice(&mut rig.events, |n| {
            matches!(n, NoticeEvent::QueueExhausted { .. })
        })
        .await;
        let view = wait_for(&hosted.handle, |v| !v.is_playing).await;
        assert_eq!(view.current_index, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_load_failure_skips_to_next_track() {
        let store = Arc::new(MemorySessionStore::new());
        let mut rig = rig(&store, Arc::new(FakeContent::default()));
        rig.output.fail_loads_of("bad", MediaErrorKind::Fatal);
        let hosted = start_host(&Config::default(), rig.deps).await.unwrap();

        hosted.handle.add(song("bad", 30)).await.unwrap();
        hosted.handle.add(song("good", 30)).await.unwrap();

        let notice = wait_notice(&mut rig.events, |n| {
            matches!(n, NoticeEvent::PlaybackFailed { .. })
        })
        .await;
        let NoticeEvent::PlaybackFailed { external_id, .. } = notice else {
            unreachable!()
        };
        assert_eq!(external_id, "bad");

        let view = wait_for(&hosted.handle, |v| {
            current_id(v) == Some("good") && v.transport == TransportState::Playing
        })
        .await;
        assert_eq!(view.current_index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn join_unknown_session_fails_with_notice() {
        let store = Arc::new(MemorySessionStore::new());
        let mut rig = rig(&store, Arc::new(FakeContent::default()));

        let result = join(&Config::default(), rig.deps, "NOPE").await;

        assert!(matches!(result, Err(TandemError::JoinFailed(_))));
        let notice = wait_notice(&mut rig.events, |_| true).await;
        assert!(matches!(notice, NoticeEvent::JoinFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn guest_follows_host_until_session_ends() {
        let store = Arc::new(MemorySessionStore::new());
        let host_rig = rig(&store, Arc::new(FakeContent::default()));
        let config = Config {
            auto_continue: false,
            ..Config::default()
        };
        let host = start_host(&config, host_rig.deps).await.unwrap().handle;
        host.add(song("a", 300)).await.unwrap();
        host.add(song("b", 300)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let mut guest_rig = rig(&store, Arc::new(FakeContent::default()));
        let guest_output = Arc::clone(&guest_rig.output);
        let guest = join(&config, guest_rig.deps, host.session_id())
            .await
            .unwrap();

        let view = wait_for(&guest, |v| v.transport == TransportState::Playing).await;
        assert_eq!(view.role, RoleKind::Guest);
        assert_eq!(view.queue.len(), 2);
        assert_eq!(current_id(&view), Some("a"));

        host.next().await.unwrap();
        wait_for(&guest, |v| current_id(v) == Some("b")).await;

        host.end().await.unwrap();
        wait_notice(&mut guest_rig.events, |n| {
            matches!(n, NoticeEvent::SessionEnded { .. })
        })
        .await;
        let view = wait_for(&guest, |v| v.ended).await;
        assert_eq!(view.queue.len(), 2);
        assert!(guest_output.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn guest_contributions_reach_host_unless_locked() {
        let store = Arc::new(MemorySessionStore::new());
        let config = Config {
            auto_continue: false,
            ..Config::default()
        };
        let host = start_host(&config, rig(&store, Arc::new(FakeContent::default())).deps)
            .await
            .unwrap()
            .handle;
        host.add(song("a", 300)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let mut guest_rig = rig(&store, Arc::new(FakeContent::default()));
        let guest = join(&config, guest_rig.deps, host.session_id())
            .await
            .unwrap();

        guest.add(song("g", 120)).await.unwrap();
        let view = wait_for(&host, |v| v.queue.len() == 2).await;
        assert_eq!(view.queue[1].external_id, "g");
        assert_eq!(current_id(&view), Some("a"));

        host.set_locked(true).await.unwrap();
        wait_for(&guest, |v| v.is_locked).await;
        guest.add(song("x", 120)).await.unwrap();
        wait_notice(&mut guest_rig.events, |n| {
            matches!(n, NoticeEvent::SessionLocked { .. })
        })
        .await;

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(host.view().queue.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn guest_only_locks_when_host() {
        let store = Arc::new(MemorySessionStore::new());
        let host = start_host(
            &Config::default(),
            rig(&store, Arc::new(FakeContent::default())).deps,
        )
        .await
        .unwrap()
        .handle;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let guest = join(
            &Config::default(),
            rig(&store, Arc::new(FakeContent::default())).deps,
            host.session_id(),
        )
        .await
        .unwrap();

        assert!(matches!(
            guest.set_locked(true).await,
            Err(TandemError::NotHost(_))
        ));
        assert!(matches!(guest.end().await, Err(TandemError::NotHost(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_vote_advances_host() {
        let store = Arc::new(MemorySessionStore::new());
        let config = Config {
            auto_continue: false,
            ..Config::default()
        };
        let host = start_host(&config, rig(&store, Arc::new(FakeContent::default())).deps)
            .await
            .unwrap()
            .handle;
        host.add(song("a", 300)).await.unwrap();
        host.add(song("b", 300)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let guest = join(
            &config,
            rig(&store, Arc::new(FakeContent::default())).deps,
            host.session_id(),
        )
        .await
        .unwrap();

        let tally = guest.vote_skip().await.unwrap();
        assert_eq!(tally.votes, 1);
        assert!(tally.should_skip);

        wait_for(&host, |v| current_id(v) == Some("b")).await;
    }

    #[tokio::test(start_paused = true)]
    async fn guest_elevates_with_host_code() {
        let store = Arc::new(MemorySessionStore::new());
        let hosted = start_host(
            &Config::default(),
            rig(&store, Arc::new(FakeContent::default())).deps,
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut guest_rig = rig(&store, Arc::new(FakeContent::default()));
        let guest = join(&Config::default(), guest_rig.deps, hosted.handle.session_id())
            .await
            .unwrap();

        assert!(matches!(
            guest.elevate("wrong").await,
            Err(TandemError::WrongHost)
        ));
        wait_notice(&mut guest_rig.events, |n| {
            matches!(n, NoticeEvent::ElevationRefused { .. })
        })
        .await;

        guest.elevate(hosted.credential.clone()).await.unwrap();
        let view = wait_for(&guest, |v| v.role == RoleKind::Host).await;
        assert_eq!(view.session_id, hosted.handle.session_id());

        guest.set_locked(true).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn losing_audio_focus_pauses() {
        let store = Arc::new(MemorySessionStore::new());
        let arbiter = AudioFocusArbiter::new();
        let mut rig = rig(&store, Arc::new(FakeContent::default()));
        rig.deps.focus = Some(arbiter.register("session"));
        let mut other = arbiter.register("other");
        let hosted = start_host(&Config::default(), rig.deps).await.unwrap();

        hosted.handle.add(song("a", 300)).await.unwrap();
        wait_for(&hosted.handle, |v| v.transport == TransportState::Playing).await;

        other.acquire();

        wait_notice(&mut rig.events, |n| matches!(n, NoticeEvent::FocusLost { .. })).await;
        let view = wait_for(&hosted.handle, |v| !v.is_playing).await;
        assert_eq!(view.current_index, Some(0));
        assert!(!rig.output.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn replay_restores_saved_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemorySessionStore::new());
        let config = Config {
            auto_continue: false,
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let handle = start_host(&config, rig(&store, Arc::new(FakeContent::default())).deps)
            .await
            .unwrap()
            .handle;
        handle.add(song("a", 300)).await.unwrap();
        handle.add(song("b", 300)).await.unwrap();
        handle.save_replay().await.unwrap();

        handle.clear().await.unwrap();
        wait_for(&handle, |v| v.queue.is_empty()).await;

        assert_eq!(handle.load_replay().await.unwrap(), 2);
        let view = wait_for(&handle, |v| v.queue.len() == 2).await;
        assert_eq!(current_id(&view), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn replay_without_data_dir_is_refused() {
        let store = Arc::new(MemorySessionStore::new());
        let handle = start_host(
            &Config::default(),
            rig(&store, Arc::new(FakeContent::default())).deps,
        )
        .await
        .unwrap()
        .handle;

        assert!(matches!(
            handle.save_replay().await,
            Err(TandemError::DataDirNotConfigured(_))
        ));
    }
}
