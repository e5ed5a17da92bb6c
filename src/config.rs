use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Harness settings loaded from the environment.
///
/// Every field has a usable default, so a hermetic test run needs no
/// environment at all; credentials and file paths only matter for scenarios
/// driven from real WAV fixtures.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Subscription key handed to translator configurations
    pub subscription_key: String,
    /// Service region label
    pub region: String,
    /// Language of the incoming speech
    pub speech_language: String,
    /// Default translation target language
    pub target_language: String,

    /// Primary WAV fixture and its expected transcript
    pub wave_file: Option<PathBuf>,
    pub wave_file_text: Option<String>,
    /// Alternate-phrase WAV fixture and its expected transcript
    pub alternate_wave_file: Option<PathBuf>,
    pub alternate_wave_file_text: Option<String>,

    /// Lexicon file for the local engine
    pub lexicon_file: Option<PathBuf>,

    /// Opt-in switch for the slow, long-running scenarios
    pub long_running: bool,
    /// Condition-wait polling interval
    pub poll_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let subscription_key =
            env::var("PARLANCE_SUBSCRIPTION_KEY").unwrap_or_else(|_| "local-test-key".to_string());
        let region = env::var("PARLANCE_REGION").unwrap_or_else(|_| "local".to_string());
        let speech_language =
            env::var("PARLANCE_SPEECH_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());
        let target_language =
            env::var("PARLANCE_TARGET_LANGUAGE").unwrap_or_else(|_| "de-DE".to_string());

        let wave_file = env::var("PARLANCE_WAVE_FILE").ok().map(PathBuf::from);
        let wave_file_text = env::var("PARLANCE_WAVE_FILE_TEXT").ok();
        let alternate_wave_file = env::var("PARLANCE_ALTERNATE_WAVE_FILE")
            .ok()
            .map(PathBuf::from);
        let alternate_wave_file_text = env::var("PARLANCE_ALTERNATE_WAVE_FILE_TEXT").ok();

        let lexicon_file = env::var("PARLANCE_LEXICON_FILE").ok().map(PathBuf::from);

        let long_running = env::var("PARLANCE_LONG_RUNNING")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let poll_interval = env::var("PARLANCE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(100));

        Ok(Settings {
            subscription_key,
            region,
            speech_language,
            target_language,
            wave_file,
            wave_file_text,
            alternate_wave_file,
            alternate_wave_file_text,
            lexicon_file,
            long_running,
            poll_interval,
        })
    }

    /// Build a translator configuration from these settings.
    ///
    /// # Returns
    /// * `Result<TranslationConfig, TranslatorError>` - Config with the
    ///   default target language registered, or a validation error
    pub fn translation_config(
        &self,
    ) -> Result<crate::core::TranslationConfig, crate::core::TranslatorError> {
        let mut config = crate::core::TranslationConfig::from_subscription(
            self.subscription_key.clone(),
            self.region.clone(),
        )?;
        config.speech_language = self.speech_language.clone();
        config.add_target_language(self.target_language.clone());
        Ok(config)
    }
}
