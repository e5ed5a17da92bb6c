//! Recognition and connection events, delivered through cancellable
//! subscriptions.
//!
//! Event payloads are tagged variants rather than per-event assignable
//! handler fields: a subscriber registers one callback and matches on the
//! variant. Subscriptions cancel explicitly or on drop.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::base::{CancellationReason, TranslationResult};
use crate::harness::Close;

/// Events emitted by a translator over the lifetime of a recognition stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// A recognition turn opened.
    SessionStarted { session_id: String },
    /// The current recognition turn closed.
    SessionStopped { session_id: String },
    /// Speech detected after silence; offset in 100 ns ticks.
    SpeechStartDetected { offset: u64 },
    /// A speech segment ended; offset in 100 ns ticks.
    SpeechEndDetected { offset: u64 },
    /// A phrase was recognized and translated.
    Recognized {
        session_id: String,
        result: TranslationResult,
    },
    /// Recognition was canceled; emitted before the final `SessionStopped`.
    Canceled {
        session_id: String,
        reason: CancellationReason,
        error_details: Option<String>,
        offset: u64,
    },
}

/// Connection lifecycle events, observed through a
/// [`ConnectionMonitor`](super::connection::ConnectionMonitor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { generation: u64 },
    Disconnected { generation: u64 },
}

/// Async callback invoked with each delivered event.
pub type EventCallback<E> =
    Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for recognition events
pub type RecognitionCallback = EventCallback<RecognitionEvent>;

/// Callback type for connection events
pub type ConnectionCallback = EventCallback<ConnectionEvent>;

struct Registry<E> {
    next_id: u64,
    entries: Vec<(u64, EventCallback<E>)>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

/// Subscriber registry delivering events in registration order.
pub struct EventHub<E> {
    registry: Arc<RwLock<Registry<E>>>,
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
        }
    }
}

impl<E: Clone + Send + 'static> EventHub<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; the returned handle cancels delivery when
    /// canceled or dropped.
    pub fn subscribe(&self, callback: EventCallback<E>) -> Subscription {
        let id = {
            let mut registry = self.registry.write();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, callback));
            id
        };

        let registry = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = Weak::upgrade(&registry) {
                registry.write().entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Deliver `event` to every live subscriber, awaiting each callback in
    /// registration order.
    pub async fn emit(&self, event: E) {
        let callbacks: Vec<EventCallback<E>> = {
            let registry = self.registry.read();
            registry.entries.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(event.clone()).await;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.read().entries.len()
    }
}

/// Cancellable handle for a registered event callback.
///
/// Cancels on drop; [`cancel`](Subscription::cancel) makes the teardown
/// explicit. Canceling twice is a no-op.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop event delivery for this subscription.
    pub fn cancel(mut self) {
        self.cancel_now();
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl Close for Subscription {
    fn close(&mut self) {
        self.cancel_now();
    }
}
