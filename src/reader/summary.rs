use std::fmt;

/// Outcome counts of one pass over an archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Records handed to the caller.
    pub yielded: u64,
    /// Malformed records skipped in lenient mode.
    pub skipped: u64,
}

impl StreamSummary {
    /// True when no record was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped == 0
    }
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} document(s) streamed", self.yielded)?;
        if self.skipped > 0 {
            write!(f, ", {} malformed record(s) skipped", self.skipped)?;
        }
        Ok(())
    }
}

/// A malformed record skipped in lenient mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeWarning {
    /// 1-based line number within the decompressed archive.
    pub line: u64,
    /// Why the record could not be decoded.
    pub message: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}
