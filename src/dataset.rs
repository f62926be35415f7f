//! Per-dataset handle: catalog fields, replication trigger and streams.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::config::LanguageSource;
use crate::error::SpeakleashError;
use crate::manifest::DatasetDescriptor;
use crate::reader::{DecodeMode, Documents, ExtDocuments, RecordStream};
use crate::replicate::{ArchiveStatus, ReplicationCache};
use crate::transport::Transport;

/// Access point for one dataset of a catalog.
///
/// Construction never touches the network or disk. The archive is
/// replicated the first time a stream is requested; every stream reads the
/// archive from the beginning, independently of other streams.
pub struct DatasetHandle {
    descriptor: DatasetDescriptor,
    source: LanguageSource,
    cache: Arc<ReplicationCache>,
    transport: Arc<dyn Transport>,
    decode_mode: DecodeMode,
    materialized: Mutex<Option<PathBuf>>,
}

impl DatasetHandle {
    pub(crate) fn new(
        descriptor: DatasetDescriptor,
        source: LanguageSource,
        cache: Arc<ReplicationCache>,
        transport: Arc<dyn Transport>,
        decode_mode: DecodeMode,
    ) -> Self {
        Self {
            descriptor,
            source,
            cache,
            transport,
            decode_mode,
            materialized: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Number of documents declared by the catalog.
    pub fn documents(&self) -> u64 {
        self.descriptor.documents
    }

    /// Number of characters declared by the catalog.
    pub fn characters(&self) -> u64 {
        self.descriptor.characters
    }

    /// The raw catalog entry.
    pub fn manifest(&self) -> &Map<String, Value> {
        &self.descriptor.manifest
    }

    /// Parsed catalog entry with typed accessors.
    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    /// Replicates the archive if needed and returns its local path.
    ///
    /// Once this succeeds the path is remembered for the lifetime of the
    /// handle, as long as the file still exists.
    pub fn local_path(&self) -> Result<PathBuf, SpeakleashError> {
        if let Some(path) = self.materialized_path() {
            return Ok(path);
        }

        let path = self.cache.ensure(&self.descriptor)?;
        *self
            .materialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path.clone());
        Ok(path)
    }

    /// Whether a valid archive is already on disk. Never downloads.
    pub fn is_replicated(&self) -> Result<bool, SpeakleashError> {
        Ok(self.cache.status(&self.descriptor)? == ArchiveStatus::Valid)
    }

    /// Deletes the local archive. Returns whether a file was removed.
    pub fn evict(&self) -> Result<bool, SpeakleashError> {
        let removed = self.cache.evict(self.name())?;
        *self
            .materialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(removed)
    }

    fn materialized_path(&self) -> Option<PathBuf> {
        self.materialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|path| path.is_file())
            .cloned()
    }

    /// Opens a fresh record stream using the handle's decode mode.
    pub fn records(&self) -> Result<RecordStream, SpeakleashError> {
        self.records_with_mode(self.decode_mode)
    }

    /// Opens a fresh record stream with an explicit decode mode.
    pub fn records_with_mode(&self, mode: DecodeMode) -> Result<RecordStream, SpeakleashError> {
        let path = self.local_path()?;
        RecordStream::open(&path, self.name(), mode)
    }

    /// Document texts, from the first record.
    pub fn data(&self) -> Result<Documents, SpeakleashError> {
        self.records().map(Documents::new)
    }

    /// Document texts with their metadata, from the first record.
    pub fn ext_data(&self) -> Result<ExtDocuments, SpeakleashError> {
        self.records().map(ExtDocuments::new)
    }

    /// Sample documents published next to the archive. Does not replicate.
    ///
    /// Entries may be plain strings or records with a `text` field.
    pub fn samples(&self) -> Result<Vec<String>, SpeakleashError> {
        let url = self.source.sample_url(self.name());
        let fail = |message: String| SpeakleashError::SamplesUnavailable {
            dataset: self.name().to_string(),
            message,
        };

        let bytes = self
            .transport
            .fetch(&url)
            .and_then(|fetched| fetched.into_bytes(&url))
            .map_err(|err| fail(err.to_string()))?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|err| fail(format!("malformed samples: {err}")))?;
        let Value::Array(items) = value else {
            return Err(fail("malformed samples: expected a JSON array".to_string()));
        };

        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                Value::Object(mut record) => match record.remove("text") {
                    Some(Value::String(text)) => Some(text),
                    _ => None,
                },
                _ => None,
            })
            .collect())
    }
}

impl fmt::Display for DatasetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: {}, url: {}, characters: {}",
            self.name(),
            self.source.base_url,
            self.characters()
        )
    }
}

impl fmt::Debug for DatasetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetHandle")
            .field("name", &self.descriptor.name)
            .field("url", &self.descriptor.url)
            .field("documents", &self.descriptor.documents)
            .field("characters", &self.descriptor.characters)
            .finish()
    }
}
