//! Local replication of dataset archives.
//!
//! Each dataset maps to `{dir}/{name}.jsonl.zst`. A cached file is trusted
//! when it matches the descriptor's checksum, or its size when no checksum
//! is published. Otherwise the archive is streamed into a temporary file in
//! the same directory and renamed over the final path only once it is
//! complete and verified.
//!
//! At most one download per dataset runs at a time inside one cache. The
//! per-dataset lock covers download and rename only; validating an already
//! complete archive never waits on it.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::SpeakleashError;
use crate::manifest::DatasetDescriptor;
use crate::transport::Transport;

/// State of a dataset's archive on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveStatus {
    Missing,
    /// Present but does not match the descriptor.
    Stale,
    Valid,
}

/// Owner of the on-disk archive directory.
pub struct ReplicationCache {
    dir: PathBuf,
    transport: Arc<dyn Transport>,
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReplicationCache {
    /// Creates the cache, creating `dir` if it does not exist.
    pub fn new(dir: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> Result<Self, SpeakleashError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            transport,
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final location of a dataset's archive.
    pub fn archive_path(&self, name: &str) -> Result<PathBuf, SpeakleashError> {
        if !is_safe_name(name) {
            return Err(SpeakleashError::replication(
                name,
                "dataset name is not usable as a file name",
            ));
        }
        Ok(self.dir.join(format!("{name}.jsonl.zst")))
    }

    /// Checks the cached archive against the descriptor without touching the network.
    pub fn status(&self, descriptor: &DatasetDescriptor) -> Result<ArchiveStatus, SpeakleashError> {
        let path = self.archive_path(&descriptor.name)?;
        archive_status(&path, descriptor)
            .map_err(|err| SpeakleashError::replication(&descriptor.name, err.to_string()))
    }

    /// Returns the path of a valid local archive, downloading it if needed.
    pub fn ensure(&self, descriptor: &DatasetDescriptor) -> Result<PathBuf, SpeakleashError> {
        let path = self.archive_path(&descriptor.name)?;
        if self.status(descriptor)? == ArchiveStatus::Valid {
            debug!(dataset = %descriptor.name, path = %path.display(), "cache hit");
            return Ok(path);
        }

        let writer = self.writer_lock(&descriptor.name);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished the download while we waited.
        match self.status(descriptor)? {
            ArchiveStatus::Valid => {
                debug!(dataset = %descriptor.name, "cache filled by concurrent download");
                Ok(path)
            }
            status => {
                debug!(dataset = %descriptor.name, ?status, url = %descriptor.url, "cache miss");
                self.download(descriptor, &path)?;
                Ok(path)
            }
        }
    }

    /// Removes a dataset's cached archive. Returns whether a file was removed.
    pub fn evict(&self, name: &str) -> Result<bool, SpeakleashError> {
        let path = self.archive_path(name)?;
        let writer = self.writer_lock(name);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);

        match fs::remove_file(&path) {
            Ok(()) => {
                info!(dataset = name, path = %path.display(), "evicted cached archive");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(SpeakleashError::replication(name, err.to_string())),
        }
    }

    fn writer_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(writers.entry(name.to_string()).or_default())
    }

    fn download(&self, descriptor: &DatasetDescriptor, path: &Path) -> Result<(), SpeakleashError> {
        let name = descriptor.name.as_str();
        let fail = |message: String| SpeakleashError::replication(name, message);

        let mut fetched = self
            .transport
            .fetch(&descriptor.url)
            .map_err(|err| fail(format!("download failed: {err}")))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".part")
            .tempfile_in(&self.dir)
            .map_err(|err| fail(format!("cannot create temporary file: {err}")))?;

        let mut writer = HashingWriter::new(tmp.as_file_mut(), descriptor.sha256.is_some());
        let written = io::copy(&mut fetched.body, &mut writer)
            .map_err(|err| fail(format!("download interrupted: {err}")))?;
        let digest = writer.finish();

        if let Some(expected) = fetched.content_length {
            if written != expected {
                return Err(fail(format!(
                    "incomplete download: received {written} of {expected} bytes"
                )));
            }
        }
        if descriptor.file_size > 0 && written != descriptor.file_size {
            return Err(fail(format!(
                "size mismatch: received {written} bytes, manifest declares {}",
                descriptor.file_size
            )));
        }
        if let (Some(expected), Some(actual)) = (descriptor.sha256.as_deref(), digest.as_deref()) {
            if expected != actual {
                return Err(fail(format!(
                    "checksum mismatch: expected {expected}, got {actual}"
                )));
            }
        }

        tmp.as_file()
            .sync_all()
            .map_err(|err| fail(format!("cannot flush archive: {err}")))?;
        tmp.persist(path)
            .map_err(|err| fail(format!("cannot move archive into place: {}", err.error)))?;

        info!(dataset = name, bytes = written, path = %path.display(), "archive replicated");
        Ok(())
    }
}

/// Rejects names that would escape the cache directory.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn archive_status(path: &Path, descriptor: &DatasetDescriptor) -> io::Result<ArchiveStatus> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ArchiveStatus::Missing),
        Err(err) => return Err(err),
    };
    if !metadata.is_file() {
        return Ok(ArchiveStatus::Stale);
    }

    let valid = if let Some(expected) = descriptor.sha256.as_deref() {
        sha256_file(path)? == expected
    } else if descriptor.file_size > 0 {
        metadata.len() == descriptor.file_size
    } else {
        true
    };

    Ok(if valid {
        ArchiveStatus::Valid
    } else {
        ArchiveStatus::Stale
    })
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Writer that optionally hashes everything passing through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Option<Sha256>,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W, hash: bool) -> Self {
        Self {
            inner,
            hasher: hash.then(Sha256::new),
        }
    }

    fn finish(self) -> Option<String> {
        self.hasher.map(|hasher| format!("{:x}", hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
