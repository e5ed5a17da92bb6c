//! Scripted translator for deterministic harness tests.
//!
//! A replay script is a timed sequence of events. Starting the translator
//! plays the script against its subscribers; audio input is accepted for
//! interface uniformity and discarded. Useful when a test needs exact event
//! timing without pumping audio through the local engine.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock as SyncRwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use super::base::{
    BaseTranslator, ShutdownHandle, TranslationConfig, TranslatorError, TranslatorState,
};
use super::connection::ConnectionMonitor;
use super::events::{EventHub, RecognitionCallback, RecognitionEvent, Subscription};
use crate::core::audio::AudioInput;

/// One scripted step: wait, then emit.
#[derive(Debug, Clone)]
pub struct ReplayStep {
    pub delay: Duration,
    pub event: ReplayEvent,
}

/// Events a script can emit.
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    Recognition(RecognitionEvent),
    /// Route a connect through the connection monitor (generation advances).
    Connected,
    /// Route a disconnect through the connection monitor.
    Disconnected,
}

/// Ordered sequence of timed events.
#[derive(Debug, Clone, Default)]
pub struct ReplayScript {
    steps: Vec<ReplayStep>,
}

impl ReplayScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recognition event after `delay`.
    pub fn then(mut self, delay: Duration, event: RecognitionEvent) -> Self {
        self.steps.push(ReplayStep {
            delay,
            event: ReplayEvent::Recognition(event),
        });
        self
    }

    /// Append a connection event after `delay`.
    pub fn then_connection(mut self, delay: Duration, connected: bool) -> Self {
        self.steps.push(ReplayStep {
            delay,
            event: if connected {
                ReplayEvent::Connected
            } else {
                ReplayEvent::Disconnected
            },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Translator that plays back a [`ReplayScript`].
pub struct ReplayTranslator {
    config: TranslationConfig,
    script: ReplayScript,
    hub: Arc<EventHub<RecognitionEvent>>,
    connection: Arc<ConnectionMonitor>,
    state: Arc<SyncRwLock<TranslatorState>>,
    shutdown_tx: broadcast::Sender<()>,
    playback_handle: Option<JoinHandle<()>>,
}

impl ReplayTranslator {
    /// Create a replay translator with a script.
    pub fn with_script(
        config: TranslationConfig,
        script: ReplayScript,
    ) -> Result<Self, TranslatorError> {
        if config.subscription_key.is_empty() {
            return Err(TranslatorError::AuthenticationFailed(
                "subscription key is required".to_string(),
            ));
        }
        let (shutdown_tx, _) = broadcast::channel(4);
        Ok(Self {
            config,
            script,
            hub: Arc::new(EventHub::new()),
            connection: ConnectionMonitor::new(),
            state: Arc::new(SyncRwLock::new(TranslatorState::Idle)),
            shutdown_tx,
            playback_handle: None,
        })
    }
}

#[async_trait::async_trait]
impl BaseTranslator for ReplayTranslator {
    fn new(config: TranslationConfig, _input: AudioInput) -> Result<Self, TranslatorError> {
        Self::with_script(config, ReplayScript::new())
    }

    async fn start_continuous(&mut self) -> Result<(), TranslatorError> {
        match *self.state.read() {
            TranslatorState::Running => return Err(TranslatorError::AlreadyRunning),
            TranslatorState::Stopped => {
                return Err(TranslatorError::EngineError(
                    "recognizer cannot be restarted".to_string(),
                ));
            }
            TranslatorState::Idle => {}
        }

        *self.state.write() = TranslatorState::Running;
        let script = self.script.clone();
        let hub = self.hub.clone();
        let connection = self.connection.clone();
        let state = self.state.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.playback_handle = Some(tokio::spawn(async move {
            for step in script.steps {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("replay stopped before script end");
                        break;
                    }
                    _ = tokio::time::sleep(step.delay) => match step.event {
                        ReplayEvent::Recognition(event) => hub.emit(event).await,
                        ReplayEvent::Connected => {
                            connection.mark_connected().await;
                        }
                        ReplayEvent::Disconnected => connection.mark_disconnected().await,
                    },
                }
            }
            *state.write() = TranslatorState::Stopped;
        }));
        Ok(())
    }

    async fn stop_continuous(&mut self) -> Result<(), TranslatorError> {
        if *self.state.read() == TranslatorState::Idle {
            return Err(TranslatorError::NotRunning);
        }
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.playback_handle.take() {
            let _ = handle.await;
        }
        *self.state.write() = TranslatorState::Stopped;
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.state.read() == TranslatorState::Running
    }

    fn subscribe(&self, callback: RecognitionCallback) -> Subscription {
        self.hub.subscribe(callback)
    }

    fn connection(&self) -> Arc<ConnectionMonitor> {
        self.connection.clone()
    }

    fn config(&self) -> &TranslationConfig {
        &self.config
    }

    fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.shutdown_tx.clone())
    }

    fn provider_info(&self) -> &'static str {
        "Replay translation engine"
    }
}
