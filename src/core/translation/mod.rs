mod base;
mod connection;
pub mod events;
mod lexicon;
pub mod local;
pub mod replay;

// Re-export public types and traits
pub use base::{
    BaseTranslator, CancellationReason, ResultReason, ShutdownHandle, TICKS_PER_SECOND,
    TranslationConfig, TranslationResult, TranslatorError, TranslatorState, ticks_from_samples,
};
pub use connection::ConnectionMonitor;
pub use events::{
    ConnectionCallback, ConnectionEvent, EventHub, RecognitionCallback, RecognitionEvent,
    Subscription,
};
pub use lexicon::{Lexicon, PhraseEntry};

// Re-export engine implementations
pub use local::{LocalEngineConfig, LocalTranslator};
pub use replay::{ReplayScript, ReplayTranslator};

use crate::core::audio::AudioInput;

/// Supported translation providers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TranslatorProvider {
    /// In-process deterministic engine
    Local,
    /// Scripted playback engine
    Replay,
}

impl std::fmt::Display for TranslatorProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslatorProvider::Local => write!(f, "local"),
            TranslatorProvider::Replay => write!(f, "replay"),
        }
    }
}

impl std::str::FromStr for TranslatorProvider {
    type Err = TranslatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(TranslatorProvider::Local),
            "replay" => Ok(TranslatorProvider::Replay),
            _ => Err(TranslatorError::ConfigurationError(format!(
                "Unsupported translation provider: {s}. Supported providers: local, replay"
            ))),
        }
    }
}

/// Factory function to create translators by provider name
///
/// # Arguments
/// * `provider` - The name of the provider (e.g., "local")
/// * `config` - Translation configuration
/// * `input` - Audio input the translator consumes once started
///
/// # Returns
/// * `Result<Box<dyn BaseTranslator>, TranslatorError>` - A boxed translator or error
pub fn create_translator(
    provider: &str,
    config: TranslationConfig,
    input: AudioInput,
) -> Result<Box<dyn BaseTranslator>, TranslatorError> {
    let provider_enum: TranslatorProvider = provider.parse()?;

    match provider_enum {
        TranslatorProvider::Local => {
            let translator = <LocalTranslator as BaseTranslator>::new(config, input)?;
            Ok(Box::new(translator))
        }
        TranslatorProvider::Replay => {
            let translator = <ReplayTranslator as BaseTranslator>::new(config, input)?;
            Ok(Box::new(translator))
        }
    }
}

/// Get a list of all supported translation providers
pub fn get_supported_translators() -> Vec<&'static str> {
    vec!["local", "replay"]
}
