use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use url::Url;

use super::connection::ConnectionMonitor;
use super::events::{RecognitionCallback, Subscription};
use crate::core::audio::AudioInput;
use crate::harness::Close;

/// Offset unit: 100 ns ticks, ten million per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Convert a sample position to an event offset in ticks.
pub fn ticks_from_samples(samples: u64, sample_rate: u32) -> u64 {
    samples * TICKS_PER_SECOND / u64::from(sample_rate.max(1))
}

/// Configuration for translation recognizers
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Subscription key authorizing the recognizer
    pub subscription_key: String,
    /// Service region (mutually informative with `endpoint`)
    pub region: Option<String>,
    /// Explicit service endpoint, overriding the region
    pub endpoint: Option<Url>,
    /// Language code of the incoming speech (e.g., "en-US")
    pub speech_language: String,
    /// Languages translations are produced for
    pub target_languages: Vec<String>,
    /// Sample rate of the audio in Hz
    pub sample_rate: u32,
    /// Number of audio channels (1 for mono)
    pub channels: u16,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            subscription_key: String::new(),
            region: None,
            endpoint: None,
            speech_language: "en-US".to_string(),
            target_languages: Vec::new(),
            sample_rate: 16000,
            channels: 1,
        }
    }
}

impl TranslationConfig {
    /// Build a configuration from a subscription key and region.
    ///
    /// # Errors
    /// * `AuthenticationFailed` - empty subscription key
    pub fn from_subscription(
        subscription_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, TranslatorError> {
        let subscription_key = subscription_key.into();
        if subscription_key.is_empty() {
            return Err(TranslatorError::AuthenticationFailed(
                "subscription key is required".to_string(),
            ));
        }
        Ok(Self {
            subscription_key,
            region: Some(region.into()),
            ..Default::default()
        })
    }

    /// Build a configuration from an explicit endpoint and key.
    pub fn from_endpoint(
        endpoint: Url,
        subscription_key: impl Into<String>,
    ) -> Result<Self, TranslatorError> {
        let subscription_key = subscription_key.into();
        if subscription_key.is_empty() {
            return Err(TranslatorError::AuthenticationFailed(
                "subscription key is required".to_string(),
            ));
        }
        Ok(Self {
            subscription_key,
            endpoint: Some(endpoint),
            ..Default::default()
        })
    }

    /// Register an additional translation target language.
    pub fn add_target_language(&mut self, language: impl Into<String>) {
        let language = language.into();
        if !self.target_languages.contains(&language) {
            self.target_languages.push(language);
        }
    }
}

/// Why a recognition result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultReason {
    /// Speech was recognized and translated
    TranslatedSpeech,
    /// A speech segment was detected but matched nothing
    NoMatch,
}

/// Why recognition was canceled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The audio stream reached its end
    EndOfStream,
    /// The engine failed
    Error,
}

/// A recognized (and translated) phrase
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    pub reason: ResultReason,
    /// Transcript in the speech language; empty around connection drops
    pub text: String,
    /// Translations keyed by target language
    pub translations: HashMap<String, String>,
    /// Segment start, in 100 ns ticks from the beginning of the stream
    pub offset: u64,
    /// Segment length in 100 ns ticks
    pub duration: u64,
}

impl TranslationResult {
    pub fn translation_for(&self, language: &str) -> Option<&str> {
        self.translations.get(language).map(String::as_str)
    }
}

/// Error types for translator operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum TranslatorError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Invalid audio format: {0}")]
    InvalidAudioFormat(String),
    #[error("Engine error: {0}")]
    EngineError(String),
    #[error("Recognizer is already running")]
    AlreadyRunning,
    #[error("Recognizer is not running")]
    NotRunning,
}

/// Lifecycle state of a translator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorState {
    /// Created, not started
    Idle,
    /// Continuous recognition in progress
    Running,
    /// Finished or stopped; cannot be restarted
    Stopped,
}

/// Synchronous stop signal for a running translator.
///
/// Firing the signal asks the engine task to wind down; it is safe from any
/// context, including Drop-time teardown, and firing twice is harmless.
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub(crate) fn new(tx: broadcast::Sender<()>) -> Self {
        Self { tx }
    }

    pub fn fire(&self) {
        let _ = self.tx.send(());
    }
}

impl Close for ShutdownHandle {
    fn close(&mut self) {
        self.fire();
    }
}

/// Base trait for translation recognizers
#[async_trait::async_trait]
pub trait BaseTranslator: Send + Sync {
    /// Create a new recognizer over the given audio input
    ///
    /// # Arguments
    /// * `config` - Translation configuration
    /// * `input` - Audio input the recognizer consumes once started
    ///
    /// # Returns
    /// * `Result<Self, TranslatorError>` - New instance or error
    fn new(config: TranslationConfig, input: AudioInput) -> Result<Self, TranslatorError>
    where
        Self: Sized;

    /// Start continuous recognition
    ///
    /// # Returns
    /// * `Result<(), TranslatorError>` - Success or error
    async fn start_continuous(&mut self) -> Result<(), TranslatorError>;

    /// Stop continuous recognition and wait for the engine to wind down
    ///
    /// # Returns
    /// * `Result<(), TranslatorError>` - Success or error
    async fn stop_continuous(&mut self) -> Result<(), TranslatorError>;

    /// Whether continuous recognition is currently in progress
    fn is_running(&self) -> bool;

    /// Register a callback for recognition events
    ///
    /// # Arguments
    /// * `callback` - Callback invoked with each event
    ///
    /// # Returns
    /// * `Subscription` - Cancellable delivery handle
    fn subscribe(&self, callback: RecognitionCallback) -> Subscription;

    /// The connection monitor for this recognizer
    fn connection(&self) -> Arc<ConnectionMonitor>;

    /// Get the current configuration
    fn config(&self) -> &TranslationConfig;

    /// Synchronous stop signal usable from scope teardown
    fn shutdown_handle(&self) -> ShutdownHandle;

    /// Get provider-specific information
    fn provider_info(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{AudioInput, MemoryPullSource};
    use crate::core::translation::events::{EventHub, RecognitionEvent};
    use parking_lot::RwLock;

    // Mock implementation for testing the trait surface
    struct MockTranslator {
        config: TranslationConfig,
        hub: EventHub<RecognitionEvent>,
        connection: Arc<ConnectionMonitor>,
        state: RwLock<TranslatorState>,
        shutdown_tx: broadcast::Sender<()>,
    }

    #[async_trait::async_trait]
    impl BaseTranslator for MockTranslator {
        fn new(config: TranslationConfig, _input: AudioInput) -> Result<Self, TranslatorError> {
            if config.subscription_key.is_empty() {
                return Err(TranslatorError::AuthenticationFailed(
                    "subscription key is required".to_string(),
                ));
            }
            let (shutdown_tx, _) = broadcast::channel(1);
            Ok(Self {
                config,
                hub: EventHub::new(),
                connection: ConnectionMonitor::new(),
                state: RwLock::new(TranslatorState::Idle),
                shutdown_tx,
            })
        }

        async fn start_continuous(&mut self) -> Result<(), TranslatorError> {
            *self.state.write() = TranslatorState::Running;
            self.hub
                .emit(RecognitionEvent::SessionStarted {
                    session_id: "mock".to_string(),
                })
                .await;
            Ok(())
        }

        async fn stop_continuous(&mut self) -> Result<(), TranslatorError> {
            if !self.is_running() {
                return Err(TranslatorError::NotRunning);
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
            "MockTranslator v1.0"
        }
    }

    fn mock_input() -> AudioInput {
        AudioInput::pull(MemoryPullSource::new(Vec::new()))
    }

    #[test]
    fn from_subscription_requires_a_key() {
        let result = TranslationConfig::from_subscription("", "local");
        assert!(matches!(
            result,
            Err(TranslatorError::AuthenticationFailed(_))
        ));

        let config = TranslationConfig::from_subscription("key", "local").unwrap();
        assert_eq!(config.region.as_deref(), Some("local"));
        assert_eq!(config.speech_language, "en-US");
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn from_endpoint_carries_the_url() {
        let endpoint = Url::parse("wss://localhost:4443/speech").unwrap();
        let config = TranslationConfig::from_endpoint(endpoint.clone(), "key").unwrap();
        assert_eq!(config.endpoint, Some(endpoint));
        assert!(config.region.is_none());
    }

    #[test]
    fn add_target_language_deduplicates() {
        let mut config = TranslationConfig::from_subscription("key", "local").unwrap();
        config.add_target_language("de-DE");
        config.add_target_language("fr-FR");
        config.add_target_language("de-DE");
        assert_eq!(config.target_languages, vec!["de-DE", "fr-FR"]);
    }

    #[test]
    fn ticks_scale_with_sample_rate() {
        // One second of audio is ten million ticks at any rate.
        assert_eq!(ticks_from_samples(16000, 16000), TICKS_PER_SECOND);
        assert_eq!(ticks_from_samples(8000, 16000), TICKS_PER_SECOND / 2);
        assert_eq!(ticks_from_samples(0, 16000), 0);
    }

    #[tokio::test]
    async fn mock_translator_lifecycle() {
        let config = TranslationConfig::from_subscription("key", "local").unwrap();
        let mut translator = MockTranslator::new(config, mock_input()).unwrap();
        assert!(!translator.is_running());

        let started = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let started_clone = started.clone();
        let _subscription = translator.subscribe(Arc::new(move |event| {
            let started = started_clone.clone();
            Box::pin(async move {
                if matches!(event, RecognitionEvent::SessionStarted { .. }) {
                    started.store(true, std::sync::atomic::Ordering::SeqCst);
                }
            })
        }));

        translator.start_continuous().await.unwrap();
        assert!(translator.is_running());
        assert!(started.load(std::sync::atomic::Ordering::SeqCst));

        translator.stop_continuous().await.unwrap();
        assert!(!translator.is_running());
        assert!(matches!(
            translator.stop_continuous().await,
            Err(TranslatorError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn mock_translator_rejects_empty_key() {
        let result = MockTranslator::new(TranslationConfig::default(), mock_input());
        assert!(matches!(
            result,
            Err(TranslatorError::AuthenticationFailed(_))
        ));
    }
}
