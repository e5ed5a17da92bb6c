pub mod audio;
pub mod translation;

// Re-export commonly used items for convenience
pub use audio::{
    AudioChunks, AudioError, AudioInput, ChunkedFileReader, PullAudioSource, PushAudioStream,
    push_audio_stream,
};
pub use translation::{
    BaseTranslator, CancellationReason, ConnectionEvent, ConnectionMonitor, Lexicon,
    LocalEngineConfig, LocalTranslator, RecognitionEvent, ReplayScript, ReplayTranslator,
    ResultReason, TranslationConfig, TranslationResult, TranslatorError, TranslatorProvider,
    create_translator, get_supported_translators,
};
