//! Local deterministic translation engine.
//!
//! Recognition runs entirely in-process: the engine segments 16-bit mono PCM
//! on silence gaps, fingerprints each segment and resolves it against a
//! [`Lexicon`]. Offsets are derived from the stream byte position, so they
//! are monotonic across the whole stream, including reconnect cycles.
//!
//! The engine also reproduces the service behaviors long-running streaming
//! tests care about: connections are dropped after a configurable amount of
//! consumed audio (`max_connection_age_ms`), after sustained silence
//! (`idle_cutoff_ms`), or when no audio arrives at all for a wall-clock
//! interval (`no_data_timeout`); each drop is followed by a transparent
//! reconnect with a fresh session. Audio clipped by a drop surfaces as an
//! empty-text phrase, the way the real service reports it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock as SyncRwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::base::{
    BaseTranslator, ShutdownHandle, TranslationConfig, TranslationResult, TranslatorError,
    TranslatorState, CancellationReason, ResultReason, ticks_from_samples,
};
use super::connection::ConnectionMonitor;
use super::events::{EventHub, RecognitionCallback, RecognitionEvent, Subscription};
use super::lexicon::Lexicon;
use crate::core::audio::AudioInput;

/// Configuration specific to the local engine
#[derive(Debug, Clone)]
pub struct LocalEngineConfig {
    /// Base translation configuration
    pub base: TranslationConfig,
    /// Phrase table segments are resolved against
    pub lexicon: Lexicon,
    /// Silence run that closes a segment, in milliseconds of audio
    pub silence_gap_ms: u64,
    /// Absolute sample value at or below which audio counts as silence
    pub amplitude_threshold: i16,
    /// Drop the connection after this much consumed audio, in milliseconds
    pub max_connection_age_ms: Option<u64>,
    /// Drop the connection after this much uninterrupted silence, in milliseconds
    pub idle_cutoff_ms: Option<u64>,
    /// Drop the connection when no chunk arrives for this wall-clock interval
    pub no_data_timeout: Option<Duration>,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            base: TranslationConfig::default(),
            lexicon: Lexicon::default(),
            silence_gap_ms: 200,
            amplitude_threshold: 512,
            max_connection_age_ms: None,
            idle_cutoff_ms: None,
            no_data_timeout: None,
        }
    }
}

impl LocalEngineConfig {
    pub fn from_base(base: TranslationConfig) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }
}

fn ms_to_samples(ms: u64, sample_rate: u32) -> u64 {
    ms * u64::from(sample_rate) / 1000
}

/// Recognition state moved into the spawned engine task.
struct Engine {
    cfg: LocalEngineConfig,
    hub: Arc<EventHub<RecognitionEvent>>,
    connection: Arc<ConnectionMonitor>,
    state: Arc<SyncRwLock<TranslatorState>>,
    session_id: String,
    sample_pos: u64,
    segment: Vec<i16>,
    segment_start: u64,
    silence_run: u64,
    idle_silence_run: u64,
    connection_started_pos: u64,
    pending_byte: Option<u8>,
    gap_samples: u64,
    age_samples: Option<u64>,
    idle_samples: Option<u64>,
}

impl Engine {
    fn new(
        cfg: LocalEngineConfig,
        hub: Arc<EventHub<RecognitionEvent>>,
        connection: Arc<ConnectionMonitor>,
        state: Arc<SyncRwLock<TranslatorState>>,
    ) -> Self {
        let rate = cfg.base.sample_rate;
        let gap_samples = ms_to_samples(cfg.silence_gap_ms, rate).max(1);
        let age_samples = cfg.max_connection_age_ms.map(|ms| ms_to_samples(ms, rate).max(1));
        let idle_samples = cfg.idle_cutoff_ms.map(|ms| ms_to_samples(ms, rate).max(1));
        Self {
            cfg,
            hub,
            connection,
            state,
            session_id: String::new(),
            sample_pos: 0,
            segment: Vec::new(),
            segment_start: 0,
            silence_run: 0,
            idle_silence_run: 0,
            connection_started_pos: 0,
            pending_byte: None,
            gap_samples,
            age_samples,
            idle_samples,
        }
    }

    fn ticks(&self, samples: u64) -> u64 {
        ticks_from_samples(samples, self.cfg.base.sample_rate)
    }

    async fn run(mut self, mut input: AudioInput, mut shutdown_rx: broadcast::Receiver<()>) {
        self.open_connection().await;

        loop {
            let no_data = self.cfg.no_data_timeout;
            let chunk = tokio::select! {
                _ = shutdown_rx.recv() => {
                    self.stop_requested().await;
                    input.close();
                    return;
                }
                chunk = input.next_chunk() => chunk,
                _ = tokio::time::sleep(no_data.unwrap_or(Duration::from_secs(86_400))),
                        if no_data.is_some() => {
                    warn!(timeout = ?no_data, "no audio received, recycling connection");
                    self.recycle_connection().await;
                    continue;
                }
            };

            match chunk {
                Some(bytes) => self.process_chunk(&bytes).await,
                None => {
                    self.end_of_stream().await;
                    input.close();
                    return;
                }
            }
        }
    }

    async fn process_chunk(&mut self, bytes: &[u8]) {
        let mut data = bytes;
        if let Some(low) = self.pending_byte.take() {
            if let Some((&high, rest)) = data.split_first() {
                self.ingest_sample(i16::from_le_bytes([low, high])).await;
                data = rest;
            } else {
                self.pending_byte = Some(low);
                return;
            }
        }
        for pair in data.chunks_exact(2) {
            self.ingest_sample(i16::from_le_bytes([pair[0], pair[1]])).await;
        }
        if data.len() % 2 == 1 {
            self.pending_byte = Some(data[data.len() - 1]);
        }
    }

    async fn ingest_sample(&mut self, sample: i16) {
        self.sample_pos += 1;
        let voiced = i32::from(sample).abs() > i32::from(self.cfg.amplitude_threshold);

        if voiced {
            if self.segment.is_empty() {
                self.segment_start = self.sample_pos - 1;
                let offset = self.ticks(self.segment_start);
                self.hub
                    .emit(RecognitionEvent::SpeechStartDetected { offset })
                    .await;
            }
            self.segment.push(sample);
            self.silence_run = 0;
            self.idle_silence_run = 0;
        } else {
            self.silence_run += 1;
            self.idle_silence_run += 1;
            if !self.segment.is_empty() {
                self.segment.push(sample);
                if self.silence_run >= self.gap_samples {
                    self.finalize_segment().await;
                }
            }
            if let Some(idle) = self.idle_samples {
                if self.idle_silence_run >= idle {
                    info!("idle audio cutoff reached, recycling connection");
                    self.recycle_connection().await;
                }
            }
        }

        if let Some(age) = self.age_samples {
            if self.sample_pos - self.connection_started_pos >= age {
                info!("connection age limit reached, recycling connection");
                self.recycle_connection().await;
            }
        }
    }

    /// Resolve the pending segment against the lexicon and emit its events.
    async fn finalize_segment(&mut self) {
        if self.segment.is_empty() {
            return;
        }
        let threshold = i32::from(self.cfg.amplitude_threshold);
        let voiced = |s: &i16| i32::from(*s).abs() > threshold;
        // Segments open on a voiced sample, so both bounds exist.
        let first = self.segment.iter().position(voiced).unwrap_or(0);
        let last = self.segment.iter().rposition(voiced).unwrap_or(0);
        let trimmed = &self.segment[first..=last];

        let offset = self.ticks(self.segment_start + first as u64);
        let duration = self.ticks(trimmed.len() as u64);
        let result = match self.cfg.lexicon.lookup(&Lexicon::fingerprint(trimmed)) {
            Some(entry) => {
                let translations: HashMap<String, String> = entry
                    .translations
                    .iter()
                    .filter(|(language, _)| self.cfg.base.target_languages.contains(language))
                    .map(|(language, text)| (language.clone(), text.clone()))
                    .collect();
                debug!(transcript = %entry.transcript, offset, "segment recognized");
                TranslationResult {
                    reason: ResultReason::TranslatedSpeech,
                    text: entry.transcript.clone(),
                    translations,
                    offset,
                    duration,
                }
            }
            None => {
                debug!(samples = trimmed.len(), offset, "segment matched no phrase");
                TranslationResult {
                    reason: ResultReason::NoMatch,
                    text: String::new(),
                    translations: HashMap::new(),
                    offset,
                    duration,
                }
            }
        };

        self.hub
            .emit(RecognitionEvent::Recognized {
                session_id: self.session_id.clone(),
                result,
            })
            .await;
        let end_offset = self.ticks(self.segment_start + self.segment.len() as u64);
        self.hub
            .emit(RecognitionEvent::SpeechEndDetected { offset: end_offset })
            .await;

        self.segment.clear();
        self.silence_run = 0;
    }

    /// Audio clipped by a connection drop surfaces as an empty-text phrase.
    async fn flush_clipped_segment(&mut self) {
        if self.segment.is_empty() {
            return;
        }
        let offset = self.ticks(self.segment_start);
        let duration = self.ticks(self.segment.len() as u64);
        self.hub
            .emit(RecognitionEvent::Recognized {
                session_id: self.session_id.clone(),
                result: TranslationResult {
                    reason: ResultReason::TranslatedSpeech,
                    text: String::new(),
                    translations: HashMap::new(),
                    offset,
                    duration,
                },
            })
            .await;
        self.segment.clear();
        self.silence_run = 0;
    }

    async fn open_connection(&mut self) {
        let generation = self.connection.mark_connected().await;
        self.session_id = Uuid::new_v4().to_string();
        self.connection_started_pos = self.sample_pos;
        self.idle_silence_run = 0;
        info!(generation, session_id = %self.session_id, "connection established");
        self.hub
            .emit(RecognitionEvent::SessionStarted {
                session_id: self.session_id.clone(),
            })
            .await;
    }

    async fn recycle_connection(&mut self) {
        self.flush_clipped_segment().await;
        let session_id = self.session_id.clone();
        self.connection.mark_disconnected().await;
        self.hub
            .emit(RecognitionEvent::SessionStopped { session_id })
            .await;
        self.open_connection().await;
    }

    async fn end_of_stream(&mut self) {
        self.finalize_segment().await;
        let offset = self.ticks(self.sample_pos);
        info!(offset, "end of audio stream");
        self.hub
            .emit(RecognitionEvent::Canceled {
                session_id: self.session_id.clone(),
                reason: CancellationReason::EndOfStream,
                error_details: None,
                offset,
            })
            .await;
        self.hub
            .emit(RecognitionEvent::SessionStopped {
                session_id: self.session_id.clone(),
            })
            .await;
        self.connection.mark_disconnected().await;
        *self.state.write() = TranslatorState::Stopped;
    }

    async fn stop_requested(&mut self) {
        debug!(session_id = %self.session_id, "stop requested");
        self.hub
            .emit(RecognitionEvent::SessionStopped {
                session_id: self.session_id.clone(),
            })
            .await;
        self.connection.mark_disconnected().await;
        *self.state.write() = TranslatorState::Stopped;
    }
}

/// Translation recognizer backed by the in-process engine.
pub struct LocalTranslator {
    config: LocalEngineConfig,
    hub: Arc<EventHub<RecognitionEvent>>,
    connection: Arc<ConnectionMonitor>,
    state: Arc<SyncRwLock<TranslatorState>>,
    // Parked here until start; the engine task takes ownership.
    input: Mutex<Option<AudioInput>>,
    shutdown_tx: broadcast::Sender<()>,
    engine_handle: Option<JoinHandle<()>>,
}

impl LocalTranslator {
    /// Create a recognizer with engine-specific settings.
    ///
    /// # Errors
    /// * `AuthenticationFailed` - empty subscription key
    /// * `InvalidAudioFormat` - non-mono audio or a zero sample rate
    pub fn with_engine_config(
        config: LocalEngineConfig,
        input: AudioInput,
    ) -> Result<Self, TranslatorError> {
        if config.base.subscription_key.is_empty() {
            return Err(TranslatorError::AuthenticationFailed(
                "subscription key is required".to_string(),
            ));
        }
        if config.base.channels != 1 {
            return Err(TranslatorError::InvalidAudioFormat(format!(
                "expected mono audio, got {} channels",
                config.base.channels
            )));
        }
        if config.base.sample_rate == 0 {
            return Err(TranslatorError::InvalidAudioFormat(
                "sample rate must be positive".to_string(),
            ));
        }

        let (shutdown_tx, _) = broadcast::channel(4);
        Ok(Self {
            config,
            hub: Arc::new(EventHub::new()),
            connection: ConnectionMonitor::new(),
            state: Arc::new(SyncRwLock::new(TranslatorState::Idle)),
            input: Mutex::new(Some(input)),
            shutdown_tx,
            engine_handle: None,
        })
    }

    pub fn engine_config(&self) -> &LocalEngineConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl BaseTranslator for LocalTranslator {
    fn new(config: TranslationConfig, input: AudioInput) -> Result<Self, TranslatorError> {
        Self::with_engine_config(LocalEngineConfig::from_base(config), input)
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
        if self.config.base.target_languages.is_empty() {
            return Err(TranslatorError::ConfigurationError(
                "at least one target language must be registered".to_string(),
            ));
        }
        let input = self.input.lock().take().ok_or_else(|| {
            TranslatorError::EngineError("audio input already consumed".to_string())
        })?;

        *self.state.write() = TranslatorState::Running;
        let engine = Engine::new(
            self.config.clone(),
            self.hub.clone(),
            self.connection.clone(),
            self.state.clone(),
        );
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.engine_handle = Some(tokio::spawn(engine.run(input, shutdown_rx)));
        Ok(())
    }

    async fn stop_continuous(&mut self) -> Result<(), TranslatorError> {
        if *self.state.read() == TranslatorState::Idle {
            return Err(TranslatorError::NotRunning);
        }
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.engine_handle.take() {
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
        &self.config.base
    }

    fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.shutdown_tx.clone())
    }

    fn provider_info(&self) -> &'static str {
        "Local deterministic translation engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::MemoryPullSource;
    use crate::harness::Latch;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    fn phrase(seed: i16) -> Vec<i16> {
        (0..400)
            .map(|i| (2000 + seed * 10) * if i % 2 == 0 { 1 } else { -1 })
            .collect()
    }

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn test_config(lexicon: Lexicon) -> LocalEngineConfig {
        let mut base = TranslationConfig::from_subscription("test-key", "local").unwrap();
        base.add_target_language("de-DE");
        LocalEngineConfig {
            base,
            lexicon,
            silence_gap_ms: 50,
            ..Default::default()
        }
    }

    #[test]
    fn empty_subscription_key_is_rejected() {
        let input = AudioInput::pull(MemoryPullSource::new(Vec::new()));
        let result = LocalTranslator::new(TranslationConfig::default(), input);
        assert!(matches!(
            result,
            Err(TranslatorError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn stereo_audio_is_rejected() {
        let mut config = TranslationConfig::from_subscription("key", "local").unwrap();
        config.channels = 2;
        let input = AudioInput::pull(MemoryPullSource::new(Vec::new()));
        assert!(matches!(
            LocalTranslator::new(config, input),
            Err(TranslatorError::InvalidAudioFormat(_))
        ));
    }

    #[tokio::test]
    async fn start_requires_a_target_language() {
        let config = TranslationConfig::from_subscription("key", "local").unwrap();
        let input = AudioInput::pull(MemoryPullSource::new(Vec::new()));
        let mut translator = LocalTranslator::new(config, input).unwrap();
        assert!(matches!(
            translator.start_continuous().await,
            Err(TranslatorError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn stop_before_start_is_an_error() {
        let input = AudioInput::pull(MemoryPullSource::new(Vec::new()));
        let mut translator =
            LocalTranslator::with_engine_config(test_config(Lexicon::new()), input).unwrap();
        assert!(matches!(
            translator.stop_continuous().await,
            Err(TranslatorError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn recognizes_taught_phrase_and_filters_translations() {
        let samples = phrase(1);
        let mut lexicon = Lexicon::new();
        lexicon.add_phrase(
            &samples,
            "turn it down",
            &[("de-DE", "mach es leiser"), ("fr-FR", "baisse le son")],
        );

        // Phrase followed by enough silence to close the segment.
        let mut audio = pcm_bytes(&samples);
        audio.extend(pcm_bytes(&vec![0i16; 1600]));
        let input = AudioInput::pull(MemoryPullSource::new(audio));

        let mut translator =
            LocalTranslator::with_engine_config(test_config(lexicon), input).unwrap();

        let results = Arc::new(Mutex::new(Vec::new()));
        let done = Latch::new();
        let results_clone = results.clone();
        let done_clone = done.clone();
        let _subscription = translator.subscribe(Arc::new(move |event| {
            let results = results_clone.clone();
            let done = done_clone.clone();
            Box::pin(async move {
                match event {
                    RecognitionEvent::Recognized { result, .. } => results.lock().push(result),
                    RecognitionEvent::Canceled { reason, .. } => {
                        assert_eq!(reason, CancellationReason::EndOfStream);
                        done.set();
                    }
                    _ => {}
                }
            })
        }));

        translator.start_continuous().await.unwrap();
        timeout(Duration::from_secs(5), done.wait())
            .await
            .expect("stream should cancel at end of audio");
        translator.stop_continuous().await.unwrap();
        assert!(!translator.is_running());

        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].reason, ResultReason::TranslatedSpeech);
        assert_eq!(results[0].text, "turn it down");
        assert_eq!(results[0].translation_for("de-DE"), Some("mach es leiser"));
        // fr-FR is not a registered target language.
        assert_eq!(results[0].translation_for("fr-FR"), None);
    }

    #[tokio::test]
    async fn unknown_segment_reports_no_match() {
        let mut audio = pcm_bytes(&phrase(3));
        audio.extend(pcm_bytes(&vec![0i16; 1600]));
        let input = AudioInput::pull(MemoryPullSource::new(audio));

        let mut translator =
            LocalTranslator::with_engine_config(test_config(Lexicon::new()), input).unwrap();

        let results = Arc::new(Mutex::new(Vec::new()));
        let done = Latch::new();
        let results_clone = results.clone();
        let done_clone = done.clone();
        let _subscription = translator.subscribe(Arc::new(move |event| {
            let results = results_clone.clone();
            let done = done_clone.clone();
            Box::pin(async move {
                match event {
                    RecognitionEvent::Recognized { result, .. } => results.lock().push(result),
                    RecognitionEvent::Canceled { .. } => done.set(),
                    _ => {}
                }
            })
        }));

        translator.start_continuous().await.unwrap();
        timeout(Duration::from_secs(5), done.wait()).await.unwrap();
        translator.stop_continuous().await.unwrap();

        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].reason, ResultReason::NoMatch);
        assert!(results[0].text.is_empty());
    }

    #[tokio::test]
    async fn sustained_silence_recycles_the_connection() {
        // One second of silence with a 300 ms idle cutoff: recycles at
        // 300/600/900 ms of stream time, then the stream ends.
        let input = AudioInput::pull(MemoryPullSource::new(pcm_bytes(&vec![0i16; 16000])));
        let config = LocalEngineConfig {
            idle_cutoff_ms: Some(300),
            ..test_config(Lexicon::new())
        };
        let mut translator = LocalTranslator::with_engine_config(config, input).unwrap();
        let connection = translator.connection();

        let done = Latch::new();
        let done_clone = done.clone();
        let _subscription = translator.subscribe(Arc::new(move |event| {
            let done = done_clone.clone();
            Box::pin(async move {
                if matches!(event, RecognitionEvent::Canceled { .. }) {
                    done.set();
                }
            })
        }));

        translator.start_continuous().await.unwrap();
        timeout(Duration::from_secs(5), done.wait()).await.unwrap();
        translator.stop_continuous().await.unwrap();

        assert_eq!(connection.generation(), 4);
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn explicit_stop_ends_the_session_without_cancellation() {
        // The push stream stays open: only the stop call ends the session.
        let (stream, chunks) = crate::core::audio::push_audio_stream();
        let mut translator =
            LocalTranslator::with_engine_config(test_config(Lexicon::new()), AudioInput::push(chunks))
                .unwrap();

        let canceled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let canceled_clone = canceled.clone();
        let stopped_clone = stopped.clone();
        let _subscription = translator.subscribe(Arc::new(move |event| {
            let canceled = canceled_clone.clone();
            let stopped = stopped_clone.clone();
            Box::pin(async move {
                match event {
                    RecognitionEvent::Canceled { .. } => {
                        canceled.store(true, std::sync::atomic::Ordering::SeqCst);
                    }
                    RecognitionEvent::SessionStopped { .. } => {
                        stopped.store(true, std::sync::atomic::Ordering::SeqCst);
                    }
                    _ => {}
                }
            })
        }));

        translator.start_continuous().await.unwrap();
        stream.write(pcm_bytes(&vec![0i16; 160])).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        translator.stop_continuous().await.unwrap();
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!canceled.load(std::sync::atomic::Ordering::SeqCst));
        stream.close();
    }

    #[tokio::test]
    async fn restart_after_stop_is_rejected() {
        let input = AudioInput::pull(MemoryPullSource::new(pcm_bytes(&vec![0i16; 160])));
        let mut translator =
            LocalTranslator::with_engine_config(test_config(Lexicon::new()), input).unwrap();

        translator.start_continuous().await.unwrap();
        translator.stop_continuous().await.unwrap();
        assert!(matches!(
            translator.start_continuous().await,
            Err(TranslatorError::EngineError(_))
        ));
    }
}
