//! Audio focus arbitration between sibling playback subsystems.
//!
//! At most one registered subsystem holds focus. Acquiring focus revokes it
//! from the previous holder, which observes the change through its
//! [`FocusHandle`] and pauses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

struct Inner {
    /// Id of the current holder, updated before notifying members.
    holder: Mutex<Option<u64>>,
    /// Focus flag per registered member.
    members: DashMap<u64, watch::Sender<bool>>,
    next_id: AtomicU64,
}

/// Hands out focus handles and enforces a single holder.
#[derive(Clone)]
pub struct AudioFocusArbiter {
    inner: Arc<Inner>,
}

impl Default for AudioFocusArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFocusArbiter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                holder: Mutex::new(None),
                members: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a playback subsystem.
    pub fn register(&self, name: impl Into<String>) -> FocusHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(false);
        self.inner.members.insert(id, tx);
        FocusHandle {
            id,
            name: name.into(),
            inner: Arc::clone(&self.inner),
            rx,
        }
    }

    /// Id of the subsystem currently holding focus.
    pub fn holder(&self) -> Option<u64> {
        *self.inner.holder.lock()
    }
}

/// One subsystem's membership in the arbiter. Releases focus on drop.
pub struct FocusHandle {
    id: u64,
    name: String,
    inner: Arc<Inner>,
    rx: watch::Receiver<bool>,
}

impl FocusHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn has_focus(&self) -> bool {
        *self.rx.borrow()
    }

    /// Takes focus, revoking it from the previous holder.
    pub fn acquire(&mut self) {
        let mut holder = self.inner.holder.lock();
        if *holder == Some(self.id) {
            return;
        }
        if let Some(previous) = holder.replace(self.id) {
            if let Some(tx) = self.inner.members.get(&previous) {
                tx.send_replace(false);
            }
            log::info!("[AudioFocus] '{}' took focus from #{}", self.name, previous);
        }
        if let Some(tx) = self.inner.members.get(&self.id) {
            tx.send_replace(true);
        }
        // Our own grant is not a revocation.
        self.rx.mark_unchanged();
    }

    /// Gives focus up without handing it to anyone.
    pub fn release(&mut self) {
        let mut holder = self.inner.holder.lock();
        if *holder == Some(self.id) {
            *holder = None;
            if let Some(tx) = self.inner.members.get(&self.id) {
                tx.send_replace(false);
            }
            self.rx.mark_unchanged();
        }
    }

    /// Completes when another subsystem takes focus from this one.
    pub async fn revoked(&mut self) {
        loop {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
            if !*self.rx.borrow_and_update() {
                return;
            }
        }
    }
}

impl Drop for FocusHandle {
    fn drop(&mut self) {
        self.release();
        self.inner.members.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_one_holder_at_a_time() {
        let arbiter = AudioFocusArbiter::new();
        let mut session = arbiter.register("session");
        let mut preview = arbiter.register("preview");

        session.acquire();
        assert!(session.has_focus());

        preview.acquire();
        assert!(preview.has_focus());
        assert!(!session.has_focus());
        assert_eq!(arbiter.holder(), Some(preview.id()));
    }

    #[tokio::test]
    async fn previous_holder_observes_revocation() {
        let arbiter = AudioFocusArbiter::new();
        let mut session = arbiter.register("session");
        let mut preview = arbiter.register("preview");
        session.acquire();

        preview.acquire();

        tokio::time::timeout(Duration::from_secs(1), session.revoked())
            .await
            .expect("revocation not observed");
    }

    #[tokio::test(start_paused = true)]
    async fn own_acquire_is_not_a_revocation() {
        let arbiter = AudioFocusArbiter::new();
        let mut session = arbiter.register("session");
        session.acquire();

        let waited = tokio::time::timeout(Duration::from_secs(5), session.revoked()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn dropping_the_holder_frees_focus() {
        let arbiter = AudioFocusArbiter::new();
        let mut session = arbiter.register("session");
        session.acquire();
        drop(session);
        assert_eq!(arbiter.holder(), None);
    }
}
