//! Lazy decoding of dataset archives.
//!
//! An archive is JSON Lines, usually zstd-compressed: one
//! `{"text": ..., "meta": {...}}` object per line. Records are decoded one
//! line at a time, so memory use does not grow with corpus size.
//!
//! Malformed lines are skipped and counted in lenient mode (the default),
//! each one logged and kept as a [`DecodeWarning`]; strict mode ends the
//! stream at the first one. Either way the outcome is collected with
//! [`RecordStream::finish`]. Lines longer than the record limit are
//! malformed too, and are never buffered whole.

mod summary;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SpeakleashError;

pub use summary::{DecodeWarning, StreamSummary};

/// Per-document metadata (title, sentence/word counts, POS counts, ...).
pub type Metadata = Map<String, Value>;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const READ_BUFFER: usize = 256 * 1024;

/// Longest record line accepted by default, in bytes.
pub const DEFAULT_MAX_RECORD_LEN: usize = 64 * 1024 * 1024;

/// Skipped records remembered per stream; later ones are only logged.
pub const MAX_KEPT_WARNINGS: usize = 100;

/// How malformed records are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Skip and count malformed records.
    #[default]
    Lenient,
    /// Stop at the first malformed record and report it.
    Strict,
}

/// One corpus entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentRecord {
    pub text: String,
    pub meta: Metadata,
}

#[derive(Deserialize)]
struct RawRecord {
    text: String,
    #[serde(default)]
    meta: Option<Metadata>,
}

/// Decodes one archive line.
///
/// Returns `Ok(None)` for blank lines, which are not considered malformed.
pub fn decode_record_line(line: &[u8]) -> Result<Option<DocumentRecord>, serde_json::Error> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let raw: RawRecord = serde_json::from_slice(line)?;
    Ok(Some(DocumentRecord {
        text: raw.text,
        meta: raw.meta.unwrap_or_default(),
    }))
}

/// Reads one line into `buf`, keeping at most `limit` bytes of it.
///
/// The rest of an overlong line is consumed and dropped. Returns the number
/// of bytes consumed and whether the line was cut.
fn read_line_capped(reader: &mut dyn BufRead, buf: &mut Vec<u8>, limit: usize) -> io::Result<(usize, bool)> {
    let mut consumed = 0;
    let mut truncated = false;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if available.is_empty() {
            return Ok((consumed, truncated));
        }

        let (chunk, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (&available[..=end], true),
            None => (available, false),
        };
        let room = limit.saturating_sub(buf.len());
        if chunk.len() > room {
            truncated = true;
            buf.extend_from_slice(&chunk[..room]);
        } else {
            buf.extend_from_slice(chunk);
        }

        let used = chunk.len();
        reader.consume(used);
        consumed += used;
        if complete {
            return Ok((consumed, truncated));
        }
    }
}

/// Opens an archive file, transparently decompressing zstd content.
fn open_archive(path: &Path) -> Result<Box<dyn BufRead>, SpeakleashError> {
    let mut file = BufReader::with_capacity(READ_BUFFER, File::open(path)?);
    let compressed = file.fill_buf()?.starts_with(&ZSTD_MAGIC);

    if compressed {
        let decoder = zstd::stream::read::Decoder::with_buffer(file)?;
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, decoder)))
    } else {
        Ok(Box::new(file))
    }
}

/// Lazy iterator over the records of one archive.
///
/// Iteration ends at end of input, on an I/O error, or (in strict mode) on
/// the first malformed record. Call [`finish`](Self::finish) afterwards to
/// learn which.
pub struct RecordStream {
    dataset: String,
    reader: Box<dyn BufRead>,
    mode: DecodeMode,
    max_record_len: usize,
    line: u64,
    buf: Vec<u8>,
    summary: StreamSummary,
    warnings: Vec<DecodeWarning>,
    failure: Option<SpeakleashError>,
    done: bool,
}

impl RecordStream {
    /// Opens the archive at `path`, positioned at the first record.
    pub fn open(path: &Path, dataset: &str, mode: DecodeMode) -> Result<Self, SpeakleashError> {
        Ok(Self::from_reader(open_archive(path)?, dataset, mode))
    }

    /// Streams records from an already decompressed JSONL reader.
    pub fn from_reader(reader: impl BufRead + 'static, dataset: &str, mode: DecodeMode) -> Self {
        Self {
            dataset: dataset.to_string(),
            reader: Box::new(reader),
            mode,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            line: 0,
            buf: Vec::new(),
            summary: StreamSummary::default(),
            warnings: Vec::new(),
            failure: None,
            done: false,
        }
    }

    /// Streams records from a zstd-compressed JSONL reader.
    pub fn from_zstd(reader: impl Read + 'static, dataset: &str, mode: DecodeMode) -> Result<Self, SpeakleashError> {
        let decoder = zstd::stream::read::Decoder::new(reader)?;
        Ok(Self::from_reader(
            BufReader::with_capacity(READ_BUFFER, decoder),
            dataset,
            mode,
        ))
    }

    /// Caps the length of one record line. Longer lines are malformed.
    pub fn with_max_record_len(mut self, limit: usize) -> Self {
        self.max_record_len = limit;
        self
    }

    /// Dataset the records belong to.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Counts so far.
    pub fn summary(&self) -> StreamSummary {
        self.summary
    }

    /// The first [`MAX_KEPT_WARNINGS`] records skipped so far.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// Ends the stream, returning its counts or the error that stopped it.
    ///
    /// Records not yet consumed are not read.
    pub fn finish(self) -> Result<StreamSummary, SpeakleashError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.summary),
        }
    }

    /// Handles a malformed line according to the decode mode.
    fn reject(&mut self, failure: SpeakleashError, message: String) {
        match self.mode {
            DecodeMode::Lenient => {
                warn!(
                    dataset = %self.dataset,
                    line = self.line,
                    error = %message,
                    "skipping malformed record"
                );
                self.summary.skipped += 1;
                if self.warnings.len() < MAX_KEPT_WARNINGS {
                    self.warnings.push(DecodeWarning {
                        line: self.line,
                        message,
                    });
                }
            }
            DecodeMode::Strict => {
                self.failure = Some(failure);
                self.end();
            }
        }
    }

    fn end(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if self.summary.skipped > 0 {
            warn!(
                dataset = %self.dataset,
                skipped = self.summary.skipped,
                yielded = self.summary.yielded,
                "skipped malformed records"
            );
        }
    }
}

impl Iterator for RecordStream {
    type Item = DocumentRecord;

    fn next(&mut self) -> Option<DocumentRecord> {
        while !self.done {
            self.buf.clear();
            match read_line_capped(self.reader.as_mut(), &mut self.buf, self.max_record_len) {
                Ok((0, _)) => self.end(),
                Ok((_, true)) => {
                    self.line += 1;
                    let failure = SpeakleashError::RecordTooLong {
                        dataset: self.dataset.clone(),
                        line: self.line,
                        limit: self.max_record_len,
                    };
                    let message = format!("record exceeds {} bytes", self.max_record_len);
                    self.reject(failure, message);
                }
                Ok((_, false)) => {
                    self.line += 1;
                    match decode_record_line(&self.buf) {
                        Ok(Some(record)) => {
                            self.summary.yielded += 1;
                            return Some(record);
                        }
                        Ok(None) => {}
                        Err(source) => {
                            let message = source.to_string();
                            let failure = SpeakleashError::RecordDecode {
                                dataset: self.dataset.clone(),
                                line: self.line,
                                source,
                            };
                            self.reject(failure, message);
                        }
                    }
                }
                Err(err) => {
                    self.failure = Some(SpeakleashError::Io(err));
                    self.end();
                }
            }
        }
        None
    }
}

impl std::iter::FusedIterator for RecordStream {}

/// Document texts of one stream.
pub struct Documents {
    records: RecordStream,
}

impl Documents {
    pub fn new(records: RecordStream) -> Self {
        Self { records }
    }

    pub fn summary(&self) -> StreamSummary {
        self.records.summary()
    }

    pub fn warnings(&self) -> &[DecodeWarning] {
        self.records.warnings()
    }

    pub fn finish(self) -> Result<StreamSummary, SpeakleashError> {
        self.records.finish()
    }
}

impl Iterator for Documents {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.records.next().map(|record| record.text)
    }
}

/// Document texts paired with their metadata.
pub struct ExtDocuments {
    records: RecordStream,
}

impl ExtDocuments {
    pub fn new(records: RecordStream) -> Self {
        Self { records }
    }

    pub fn summary(&self) -> StreamSummary {
        self.records.summary()
    }

    pub fn warnings(&self) -> &[DecodeWarning] {
        self.records.warnings()
    }

    pub fn finish(self) -> Result<StreamSummary, SpeakleashError> {
        self.records.finish()
    }
}

impl Iterator for ExtDocuments {
    type Item = (String, Metadata);

    fn next(&mut self) -> Option<(String, Metadata)> {
        self.records.next().map(|record| (record.text, record.meta))
    }
}
