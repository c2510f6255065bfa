//! Event emitter abstraction for decoupling the session loop from transport.
//!
//! The session depends on the [`EventEmitter`] trait rather than a concrete
//! broadcast channel, so tests and embedders can observe events directly.

use super::{NoticeEvent, QueueEvent, SyncEvent, TransportEvent};

/// Trait for emitting session events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyObserver;
///
/// impl EventEmitter for MyObserver {
///     fn emit_notice(&self, event: NoticeEvent) {
///         println!("{event:?}");
///     }
///     // ...
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a queue or reserve change.
    fn emit_queue(&self, event: QueueEvent);

    /// Emits a local playback change.
    fn emit_transport(&self, event: TransportEvent);

    /// Emits a sync outcome.
    fn emit_sync(&self, event: SyncEvent);

    /// Emits a user-visible notice.
    fn emit_notice(&self, event: NoticeEvent);
}

/// No-op emitter for embedders that only read the session view.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_queue(&self, _event: QueueEvent) {}

    fn emit_transport(&self, _event: TransportEvent) {}

    fn emit_sync(&self, _event: SyncEvent) {}

    fn emit_notice(&self, _event: NoticeEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_queue(&self, event: QueueEvent) {
        tracing::debug!(?event, "queue_event");
    }

    fn emit_transport(&self, event: TransportEvent) {
        tracing::debug!(?event, "transport_event");
    }

    fn emit_sync(&self, event: SyncEvent) {
        tracing::debug!(?event, "sync_event");
    }

    fn emit_notice(&self, event: NoticeEvent) {
        tracing::debug!(?event, "notice_event");
    }
}
