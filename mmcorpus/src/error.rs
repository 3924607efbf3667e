//! Error types for corpus reading and writing.

use std::fmt;
use std::io;

/// Where in a corpus file a problem was found.
///
/// `line` is the 1-based line number when the read started from the top of
/// the file; reads that start at an arbitrary offset only know the byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: Option<u64>,
    pub offset: u64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {} (byte {})", line, self.offset),
            None => write!(f, "byte {}", self.offset),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed header or entry line. The read that hit it is aborted.
    #[error("malformed corpus at {position}: {reason}")]
    Format { position: Position, reason: String },

    /// A random-access offset that does not start an entry line.
    #[error("invalid document offset {offset}: {reason}")]
    Offset { offset: u64, reason: String },

    /// A final header count too wide for its reserved header slot.
    #[error("header value {value:?} does not fit in {width} reserved bytes")]
    Encoding { value: String, width: usize },

    /// More documents written than [`crate::DocId`] can number.
    #[error("document #{0} exceeds the supported document id range")]
    TooManyDocuments(u64),

    #[error("offset index error: {0}")]
    Index(#[from] bincode::Error),

    #[error("corpus has no offset index, random access is unavailable")]
    MissingIndex,

    #[error("document {docno} out of range for corpus of {len} documents")]
    DocumentOutOfRange { docno: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format(position: Position, reason: impl Into<String>) -> Self {
        Error::Format {
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn offset(offset: u64, reason: impl Into<String>) -> Self {
        Error::Offset {
            offset,
            reason: reason.into(),
        }
    }
}
