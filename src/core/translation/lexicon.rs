//! Phrase lexicon for the local recognition engine.
//!
//! The engine does not understand speech; it recognizes PCM segments it has
//! been taught. Each entry maps the fingerprint of a silence-trimmed sample
//! run to a transcript and its translations, which makes recognition exact,
//! deterministic and fast enough for long-running stream tests.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::base::TranslatorError;

/// Transcript and translations for one known phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseEntry {
    pub transcript: String,
    /// Translations keyed by target language (e.g., "de-DE").
    #[serde(default)]
    pub translations: HashMap<String, String>,
}

/// Fingerprint-indexed phrase table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    entries: HashMap<String, PhraseEntry>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint a sample run: SHA-256 over the little-endian bytes.
    ///
    /// Callers hash exactly the samples the engine will produce, i.e. the
    /// phrase with no leading or trailing silence.
    pub fn fingerprint(samples: &[i16]) -> String {
        let mut hasher = Sha256::new();
        for &sample in samples {
            hasher.update(sample.to_le_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    /// Teach the lexicon a phrase. Returns the fingerprint it was filed
    /// under; re-teaching the same samples overwrites the entry.
    pub fn add_phrase(
        &mut self,
        samples: &[i16],
        transcript: impl Into<String>,
        translations: &[(&str, &str)],
    ) -> String {
        let fingerprint = Self::fingerprint(samples);
        self.entries.insert(
            fingerprint.clone(),
            PhraseEntry {
                transcript: transcript.into(),
                translations: translations
                    .iter()
                    .map(|(language, text)| (language.to_string(), text.to_string()))
                    .collect(),
            },
        );
        fingerprint
    }

    pub fn lookup(&self, fingerprint: &str) -> Option<&PhraseEntry> {
        self.entries.get(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a lexicon from a JSON file.
    ///
    /// # Errors
    /// * `ConfigurationError` - unreadable file or malformed JSON
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TranslatorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TranslatorError::ConfigurationError(format!("{}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            TranslatorError::ConfigurationError(format!("{}: {e}", path.display()))
        })
    }

    /// Persist the lexicon as pretty-printed JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), TranslatorError> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self).map_err(|e| {
            TranslatorError::ConfigurationError(format!("lexicon serialization: {e}"))
        })?;
        std::fs::write(path, raw).map_err(|e| {
            TranslatorError::ConfigurationError(format!("{}: {e}", path.display()))
        })
    }
}
