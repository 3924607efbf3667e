//! Single-pass corpus writer.
//!
//! Documents are streamed straight to the sink. The header counts are not
//! known until the last document, so blank header slots are reserved up front
//! and patched in [`CorpusWriter::finish`]. Only the header bytes are ever
//! rewritten, which keeps every recorded document offset valid.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::header::{patch_header, write_placeholder, CorpusHeader, HeaderReservation};
use crate::index::OffsetIndex;
use crate::{DocId, Entry};

const BUFSIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Vocabulary size known up front. Overrides the `1 + max feature id`
    /// observed while writing, so unused vocabulary ids still count.
    pub num_terms: Option<u64>,
    /// Log a progress line every this many documents; 0 disables it.
    pub progress_interval: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            num_terms: None,
            progress_interval: 1000,
        }
    }
}

/// Final header and per-document offsets of a finished write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    pub header: CorpusHeader,
    pub offsets: OffsetIndex,
}

pub struct CorpusWriter<W: Write + Seek> {
    sink: W,
    dialect: Dialect,
    options: WriteOptions,
    reservation: HeaderReservation,
    position: u64,
    offsets: OffsetIndex,
    num_docs: u64,
    num_terms: u64,
    num_nnz: u64,
    entries: Vec<Entry>,
    line: Vec<u8>,
}

impl CorpusWriter<BufWriter<File>> {
    /// Create (or truncate) the file at `path` and reserve its header.
    pub fn create<P: AsRef<Path>>(path: P, dialect: Dialect, options: WriteOptions) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), ?dialect, "storing corpus");
        let file = File::create(path)?;
        Self::new(BufWriter::with_capacity(BUFSIZE, file), dialect, options)
    }
}

impl<W: Write + Seek> CorpusWriter<W> {
    /// Reserve the header at the sink's current position.
    pub fn new(mut sink: W, dialect: Dialect, options: WriteOptions) -> Result<Self> {
        let reservation = write_placeholder(&mut sink, &dialect)?;
        Ok(Self {
            sink,
            dialect,
            options,
            position: reservation.body_offset(),
            reservation,
            offsets: OffsetIndex::new(),
            num_docs: 0,
            num_terms: 0,
            num_nnz: 0,
            entries: Vec::new(),
            line: Vec::new(),
        })
    }

    /// Number of documents written so far.
    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    /// Append the next document. Its id is the number of documents before it.
    ///
    /// Entries whose weight coerces to zero are dropped, the rest are written
    /// in increasing feature id order.
    pub fn write_doc(&mut self, doc: &[Entry]) -> Result<()> {
        let docno = self.num_docs;
        let doc_id = DocId::try_from(docno).map_err(|_| Error::TooManyDocuments(docno))?;
        let interval = self.options.progress_interval as u64;
        if interval > 0 && docno % interval == 0 {
            tracing::info!("PROGRESS: saving document #{}", docno);
        }
        self.offsets.record(self.position);

        let dialect = self.dialect;
        self.entries.clear();
        self.entries.extend(
            doc.iter()
                .filter_map(|&(term, weight)| dialect.coerce(weight).map(|w| (term, w))),
        );
        self.entries.sort_by_key(|&(term, _)| term);

        self.line.clear();
        for &(term, weight) in &self.entries {
            dialect.encode_entry(&mut self.line, doc_id, term, weight)?;
        }
        self.sink.write_all(&self.line)?;
        self.position += self.line.len() as u64;

        self.num_nnz += self.entries.len() as u64;
        if let Some(&(max_term, _)) = self.entries.last() {
            self.num_terms = self.num_terms.max(u64::from(max_term) + 1);
        }
        self.num_docs += 1;
        Ok(())
    }

    /// Patch the header with the final counts and flush the sink.
    pub fn finish(mut self) -> Result<WriteSummary> {
        let observed = self.num_terms;
        let num_terms = match self.options.num_terms {
            Some(declared) => {
                if declared < observed {
                    tracing::warn!(
                        declared,
                        observed,
                        "declared vocabulary is smaller than the largest feature id written"
                    );
                }
                declared
            }
            None => observed,
        };
        let header = CorpusHeader {
            num_docs: self.num_docs,
            num_terms,
            num_nnz: self.num_nnz,
        };
        if let Some(density) = header.density() {
            tracing::info!(
                "saved {}x{} matrix, density={:.3}% ({}/{})",
                header.num_docs,
                header.num_terms,
                100.0 * density,
                header.num_nnz,
                u128::from(header.num_docs) * u128::from(header.num_terms)
            );
        }

        patch_header(&mut self.sink, &self.reservation, &header)?;
        self.sink.flush()?;
        Ok(WriteSummary {
            header,
            offsets: self.offsets,
        })
    }
}

/// Write all of `docs` to `sink` in one pass.
pub fn write_corpus<W, I, D>(
    sink: W,
    dialect: Dialect,
    docs: I,
    options: WriteOptions,
) -> Result<WriteSummary>
where
    W: Write + Seek,
    I: IntoIterator<Item = D>,
    D: AsRef<[Entry]>,
{
    let mut writer = CorpusWriter::new(sink, dialect, options)?;
    for doc in docs {
        writer.write_doc(doc.as_ref())?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write(dialect: Dialect, docs: &[Vec<Entry>], options: WriteOptions) -> (WriteSummary, String) {
        let mut sink = Cursor::new(Vec::new());
        let summary = write_corpus(&mut sink, dialect, docs, options).unwrap();
        (summary, String::from_utf8(sink.into_inner()).unwrap())
    }

    #[test]
    fn writes_mm_lines_and_patches_header() {
        let docs = vec![vec![(2, 3.0), (0, 1.0)], vec![], vec![(1, 2.5)]];
        let (summary, text) = write(Dialect::matrix_market(true), &docs, WriteOptions::default());
        assert_eq!(
            summary.header,
            CorpusHeader {
                num_docs: 3,
                num_terms: 3,
                num_nnz: 3
            }
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "%%MatrixMarket matrix coordinate real general");
        assert_eq!(lines[1].trim_end(), "3 3 3");
        assert_eq!(&lines[2..], &["1 1 1", "1 3 3", "3 2 2.5"]);

        let body = text.find("1 1 1").unwrap() as u64;
        let third = text.find("3 2 2.5").unwrap() as u64;
        assert_eq!(summary.offsets.slots(), &[Some(body), None, Some(third)]);
    }

    #[test]
    fn zero_weights_are_not_written() {
        let docs = vec![vec![(0, 0.0), (4, 1.0)], vec![(7, 0.0)]];
        let (summary, text) = write(Dialect::matrix_market(true), &docs, WriteOptions::default());
        assert_eq!(summary.header.num_nnz, 1);
        assert_eq!(summary.header.num_terms, 5);
        assert_eq!(summary.header.num_docs, 2);
        assert!(!text.contains("1 1 0"));
    }

    #[test]
    fn uci_truncates_counts_and_keeps_fixed_header_lines() {
        let docs = vec![vec![(0, 2.7), (1, 0.4)], vec![(3, 5.0)]];
        let (summary, text) = write(Dialect::uci(), &docs, WriteOptions::default());
        assert_eq!(summary.header.num_nnz, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].len(), 20);
        assert_eq!(
            lines.iter().map(|l| l.trim_end()).collect::<Vec<_>>(),
            vec!["2", "4", "2", "1 1 2", "2 4 5"]
        );
    }

    #[test]
    fn declared_vocabulary_overrides_observed_terms() {
        let docs = vec![vec![(1, 1.0)]];
        let options = WriteOptions {
            num_terms: Some(100),
            ..WriteOptions::default()
        };
        let (summary, _) = write(Dialect::matrix_market(false), &docs, options);
        assert_eq!(summary.header.num_terms, 100);
    }

    #[test]
    fn trailing_empty_documents_point_at_end_of_body() {
        let docs = vec![vec![(0, 1.0)], vec![], vec![]];
        let (summary, text) = write(Dialect::uci(), &docs, WriteOptions::default());
        let end = text.len() as u64;
        assert_eq!(summary.offsets.slots()[1], None);
        assert_eq!(summary.offsets.slots()[2], Some(end));
    }

    #[test]
    fn declared_terms_alone_fit_the_reserved_header() {
        let options = WriteOptions {
            num_terms: Some(u64::MAX),
            ..WriteOptions::default()
        };
        let (summary, text) = write(Dialect::matrix_market(true), &[vec![(0, 1.0)]], options);
        assert_eq!(summary.header.num_terms, u64::MAX);
        assert_eq!(text.lines().nth(1).map(str::trim_end), Some("1 18446744073709551615 1"));
    }

    #[test]
    fn oversized_totals_fail_finish_and_keep_placeholder() {
        let mut sink = Cursor::new(Vec::new());
        let options = WriteOptions {
            num_terms: Some(u64::MAX),
            ..WriteOptions::default()
        };
        let mut writer = CorpusWriter::new(&mut sink, Dialect::matrix_market(true), options).unwrap();
        writer.write_doc(&[(0, 1.0)]).unwrap();
        writer.num_docs = u64::MAX;
        writer.num_nnz = u64::MAX;
        match writer.finish() {
            Err(Error::Encoding { width, .. }) => assert_eq!(width, 50),
            other => panic!("expected encoding error, got {:?}", other),
        }
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], " ".repeat(50));
        assert_eq!(lines[2], "1 1 1");
    }

    #[test]
    fn empty_corpus_has_zero_header() {
        let (summary, _) = write(Dialect::uci(), &[], WriteOptions::default());
        assert_eq!(summary.header, CorpusHeader::default());
        assert!(summary.offsets.is_empty());
    }
}
