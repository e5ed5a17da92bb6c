//! Connection lifecycle observation for a translator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::events::{ConnectionCallback, ConnectionEvent, EventHub, Subscription};

/// Observes the (simulated) service connection behind a translator.
///
/// The generation counter advances on every connect, so a test can assert
/// that a stream survived one or more reconnect cycles.
#[derive(Default)]
pub struct ConnectionMonitor {
    hub: EventHub<ConnectionEvent>,
    generation: AtomicU64,
    connected: AtomicBool,
}

impl ConnectionMonitor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a callback for connection events.
    pub fn subscribe(&self, callback: ConnectionCallback) -> Subscription {
        self.hub.subscribe(callback)
    }

    /// Number of connections established so far (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) async fn mark_connected(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.connected.store(true, Ordering::Release);
        self.hub.emit(ConnectionEvent::Connected { generation }).await;
        generation
    }

    pub(crate) async fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            let generation = self.generation();
            self.hub
                .emit(ConnectionEvent::Disconnected { generation })
                .await;
        }
    }
}
