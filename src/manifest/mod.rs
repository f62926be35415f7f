//! The dataset catalog of one language.
//!
//! A catalog is fetched with a single request to
//! `{base_url}{structure_file}` and parsed into an ordered list of
//! [`DatasetDescriptor`]s. Nothing is cached on disk: every facade fetches
//! its own copy.

mod descriptor;

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::config::LanguageSource;
use crate::error::SpeakleashError;
use crate::transport::Transport;

pub use descriptor::{DatasetDescriptor, QualityLevel};

/// Ordered, immutable catalog of datasets for one language.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifest {
    lang: String,
    datasets: Vec<DatasetDescriptor>,
}

impl Manifest {
    /// Fetches and parses the catalog for `lang`.
    ///
    /// One request, no retries. Any failure (network, HTTP status, body
    /// shape, duplicate names) is reported as `ManifestUnavailable`.
    pub fn fetch(
        transport: &dyn Transport,
        lang: &str,
        source: &LanguageSource,
    ) -> Result<Self, SpeakleashError> {
        let url = source.catalog_url();
        let bytes = transport
            .fetch(&url)
            .and_then(|fetched| fetched.into_bytes(&url))
            .map_err(|err| SpeakleashError::manifest(lang, err.to_string()))?;

        let manifest = Self::from_slice(lang, source, &bytes)?;
        debug!(lang, url, datasets = manifest.len(), "catalog fetched");
        Ok(manifest)
    }

    /// Parses a catalog body.
    pub fn from_slice(
        lang: &str,
        source: &LanguageSource,
        bytes: &[u8],
    ) -> Result<Self, SpeakleashError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| SpeakleashError::manifest(lang, format!("malformed catalog: {err}")))?;
        let Value::Array(entries) = value else {
            return Err(SpeakleashError::manifest(
                lang,
                "malformed catalog: expected a JSON array of datasets",
            ));
        };

        let mut seen = HashSet::new();
        let mut datasets = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Object(entry) = entry else {
                continue;
            };
            let Some(descriptor) =
                DatasetDescriptor::from_entry(entry, |name| source.archive_url(name))
            else {
                continue;
            };
            if !seen.insert(descriptor.name.clone()) {
                return Err(SpeakleashError::manifest(
                    lang,
                    format!("duplicate dataset name '{}'", descriptor.name),
                ));
            }
            datasets.push(descriptor);
        }

        Ok(Self {
            lang: lang.to_string(),
            datasets,
        })
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Descriptors in catalog order.
    pub fn datasets(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    pub fn get(&self, name: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub(crate) fn into_datasets(self) -> Vec<DatasetDescriptor> {
        self.datasets
    }
}
