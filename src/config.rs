//! Client configuration: where catalogs live per language, where category
//! lists are published, and how long network calls may take.
//!
//! The defaults are compiled in; a JSON file can override any subset of
//! fields (missing fields keep their default values).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::SpeakleashError;

/// Language used when the caller does not pick one.
pub const DEFAULT_LANG: &str = "pl";

/// Default bound on connecting and on waiting for response headers, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Remote location of one language's datasets.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LanguageSource {
    /// Directory URL holding the catalog, archives and samples.
    pub base_url: String,
    /// Catalog file name, relative to `base_url`.
    pub structure_file: String,
}

impl LanguageSource {
    pub fn new(base_url: impl Into<String>, structure_file: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            structure_file: structure_file.into(),
        }
    }

    /// URL of the catalog listing every dataset of this language.
    pub fn catalog_url(&self) -> String {
        join_url(&self.base_url, &self.structure_file)
    }

    /// Default URL of a dataset's compressed JSONL archive.
    pub fn archive_url(&self, name: &str) -> String {
        join_url(&self.base_url, &format!("{name}.jsonl.zst"))
    }

    /// URL of a dataset's published sample documents.
    pub fn sample_url(&self, name: &str) -> String {
        join_url(&self.base_url, &format!("{name}.sample"))
    }
}

/// Top-level client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dataset sources keyed by language code.
    pub languages: BTreeMap<String, LanguageSource>,
    /// Category list URLs keyed by language code (newline-separated text).
    pub category_lists: BTreeMap<String, String>,
    /// Bound on connecting and on waiting for response headers; `0` disables
    /// it. Response bodies are never cut short.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let languages = BTreeMap::from([
            (
                "pl".to_string(),
                LanguageSource::new("https://speakleash.space/datasets_text/", "speakleash.json"),
            ),
            (
                "hr".to_string(),
                LanguageSource::new(
                    "https://speakleash.space/datasets_text_hr/",
                    "speakleash_hr.json",
                ),
            ),
        ]);

        Self {
            languages,
            category_lists: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Reads a JSON config file, filling unspecified fields from the defaults.
    pub fn load(path: &Path) -> Result<Self, SpeakleashError> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| SpeakleashError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the dataset source for a language, if configured.
    pub fn source(&self, lang: &str) -> Option<&LanguageSource> {
        self.languages.get(lang)
    }

    /// Points a language at a different base URL, keeping its catalog file name.
    ///
    /// Unknown languages are added with the default catalog file name.
    pub fn with_base_url(mut self, lang: &str, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        match self.languages.get_mut(lang) {
            Some(source) => source.base_url = base_url,
            None => {
                self.languages.insert(
                    lang.to_string(),
                    LanguageSource::new(base_url, "speakleash.json"),
                );
            }
        }
        self
    }

    /// Network timeout derived from `timeout_secs`.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Joins a directory URL and a file name with exactly one slash between them.
pub(crate) fn join_url(base: &str, file: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{file}")
    } else {
        format!("{base}/{file}")
    }
}
