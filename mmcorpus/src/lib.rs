//! Streaming, indexed reader and writer for sparse document-term matrices
//! stored as Matrix Market coordinate or UCI bag-of-words text files.
//!
//! Documents are streamed one at a time, so corpora larger than memory can be
//! scanned. A write pass also records the byte offset of every document, which
//! later allows reading a single document straight from disk.

pub mod dialect;
pub mod error;
pub mod grouping;
pub mod header;
pub mod index;
pub mod persist;
pub mod reader;
pub mod vocab;
pub mod writer;

pub use dialect::{Dialect, FieldOrder, HeaderShape, WeightKind};
pub use error::{Error, Position, Result};
pub use header::CorpusHeader;
pub use index::OffsetIndex;
pub use persist::{CorpusPaths, IndexedCorpus};
pub use reader::CorpusReader;
pub use vocab::Vocabulary;
pub use writer::{write_corpus, CorpusWriter, WriteOptions, WriteSummary};

pub type TermId = u32;
pub type DocId = u32;

/// One non-zero cell of a document: feature id and weight.
pub type Entry = (TermId, f64);

/// A document in sparse bag-of-words form, sorted by feature id.
pub type SparseDoc = Vec<Entry>;
