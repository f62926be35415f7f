//! The [`Speakleash`] facade.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::{Config, DEFAULT_LANG};
use crate::dataset::DatasetHandle;
use crate::error::SpeakleashError;
use crate::manifest::Manifest;
use crate::reader::DecodeMode;
use crate::replicate::ReplicationCache;
use crate::transport::{HttpTransport, Transport};

/// Construction options for [`Speakleash`].
#[derive(Clone)]
pub struct SpeakleashOptions {
    pub lang: String,
    pub config: Config,
    pub decode_mode: DecodeMode,
    /// Overrides the HTTP transport built from `config`.
    pub transport: Option<Arc<dyn Transport>>,
}

impl Default for SpeakleashOptions {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.to_string(),
            config: Config::default(),
            decode_mode: DecodeMode::default(),
            transport: None,
        }
    }
}

impl SpeakleashOptions {
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_decode_mode(mut self, mode: DecodeMode) -> Self {
        self.decode_mode = mode;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

/// Entry point: the catalog of one language replicated into one directory.
///
/// The catalog is fetched once, at construction, and never refreshed.
/// Instances share nothing with each other.
pub struct Speakleash {
    dir: PathBuf,
    lang: String,
    config: Config,
    datasets: Vec<DatasetHandle>,
    transport: Arc<dyn Transport>,
}

impl Speakleash {
    /// Opens the catalog for `lang` with the default configuration.
    pub fn new(dir: impl AsRef<Path>, lang: &str) -> Result<Self, SpeakleashError> {
        Self::with_options(dir, SpeakleashOptions::default().with_lang(lang))
    }

    /// Opens a catalog with explicit options.
    ///
    /// Creates `dir` when missing. Fails with `ManifestUnavailable` if the
    /// language is not configured or the catalog cannot be fetched.
    pub fn with_options(dir: impl AsRef<Path>, options: SpeakleashOptions) -> Result<Self, SpeakleashError> {
        let SpeakleashOptions {
            lang,
            config,
            decode_mode,
            transport,
        } = options;

        let source = config
            .source(&lang)
            .cloned()
            .ok_or_else(|| {
                let known: Vec<&str> = config.languages.keys().map(String::as_str).collect();
                SpeakleashError::manifest(
                    &lang,
                    format!("unsupported language code (supported: {})", known.join(", ")),
                )
            })?;

        let transport: Arc<dyn Transport> =
            transport.unwrap_or_else(|| Arc::new(HttpTransport::new(config.timeout())));
        let dir = dir.as_ref().to_path_buf();
        let cache = Arc::new(ReplicationCache::new(&dir, Arc::clone(&transport))?);

        let manifest = Manifest::fetch(transport.as_ref(), &lang, &source)?;
        info!(lang = %lang, datasets = manifest.len(), dir = %dir.display(), "catalog loaded");

        let datasets = manifest
            .into_datasets()
            .into_iter()
            .map(|descriptor| {
                DatasetHandle::new(
                    descriptor,
                    source.clone(),
                    Arc::clone(&cache),
                    Arc::clone(&transport),
                    decode_mode,
                )
            })
            .collect();

        Ok(Self {
            dir,
            lang,
            config,
            datasets,
            transport,
        })
    }

    /// Handles in catalog order.
    pub fn datasets(&self) -> &[DatasetHandle] {
        &self.datasets
    }

    /// Looks up a dataset by name.
    pub fn get(&self, name: &str) -> Result<&DatasetHandle, SpeakleashError> {
        self.datasets
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| SpeakleashError::DatasetNotFound {
                name: name.to_string(),
            })
    }

    /// Replication directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transport shared by all handles of this instance.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
