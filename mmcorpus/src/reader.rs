//! Streaming corpus reader.
//!
//! Only the current document is held in memory. The reader keeps a single
//! file cursor, so an in-flight [`Documents`] iterator borrows it mutably and
//! random access has to wait until the iterator is dropped.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::dialect::{Dialect, Triple};
use crate::error::{Error, Position, Result};
use crate::grouping::Grouped;
use crate::header::{parse_header, CorpusHeader};
use crate::index::OffsetIndex;
use crate::{DocId, SparseDoc};

const BUFSIZE: usize = 64 * 1024;

/// Line-at-a-time reading with position tracking.
pub(crate) struct LineCursor {
    buf: Vec<u8>,
    offset: u64,
    /// Lines consumed so far, when counting from the top of the file.
    line: Option<u64>,
}

impl LineCursor {
    pub(crate) fn at_start() -> Self {
        Self {
            buf: Vec::new(),
            offset: 0,
            line: Some(0),
        }
    }

    /// Resume at `position`, as returned by [`LineCursor::position`].
    pub(crate) fn resume(position: Position) -> Self {
        Self {
            buf: Vec::new(),
            offset: position.offset,
            line: position.line.map(|l| l - 1),
        }
    }

    /// Reads the next line, returning where it started, or `None` at end of file.
    pub(crate) fn advance<R: BufRead>(&mut self, source: &mut R) -> std::io::Result<Option<Position>> {
        self.buf.clear();
        let start = self.offset;
        let n = source.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        self.line = self.line.map(|l| l + 1);
        Ok(Some(Position {
            line: self.line,
            offset: start,
        }))
    }

    /// The line last read, including its newline.
    pub(crate) fn line(&self) -> &[u8] {
        &self.buf
    }

    /// Position of the next line to be read.
    pub(crate) fn position(&self) -> Position {
        Position {
            line: self.line.map(|l| l + 1),
            offset: self.offset,
        }
    }
}

/// Decoded entry lines, skipping blank ones. Stops after the first error.
pub(crate) struct Triples<'a, R> {
    source: &'a mut R,
    dialect: Dialect,
    cursor: LineCursor,
    done: bool,
}

impl<'a, R: BufRead> Triples<'a, R> {
    fn new(source: &'a mut R, dialect: Dialect, cursor: LineCursor) -> Self {
        Self {
            source,
            dialect,
            cursor,
            done: false,
        }
    }
}

impl<'a, R: BufRead> Iterator for Triples<'a, R> {
    type Item = Result<(Position, Triple)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let position = match self.cursor.advance(self.source) {
                Ok(Some(position)) => position,
                Ok(None) => break,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            };
            match self.dialect.decode_line(self.cursor.line(), position) {
                Ok(None) => continue,
                Ok(Some(triple)) => return Some(Ok((position, triple))),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        self.done = true;
        None
    }
}

/// Every document of a corpus in id order, as `(doc_id, document)`.
pub struct Documents<'a, R> {
    inner: Grouped<Triples<'a, R>>,
}

impl<'a, R: BufRead> Iterator for Documents<'a, R> {
    type Item = Result<(DocId, SparseDoc)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Reader over one corpus file in a fixed [`Dialect`].
pub struct CorpusReader<R> {
    source: R,
    dialect: Dialect,
    header: CorpusHeader,
    body: Position,
}

impl CorpusReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, dialect: Dialect) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), ?dialect, "initializing corpus reader");
        let file = File::open(path)?;
        Self::new(BufReader::with_capacity(BUFSIZE, file), dialect)
    }
}

impl<R: BufRead + Seek> CorpusReader<R> {
    /// Parse the header of `source`, which is read from its beginning.
    pub fn new(mut source: R, dialect: Dialect) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let (header, body) = parse_header(&mut source, &dialect)?;
        Ok(Self {
            source,
            dialect,
            header,
            body,
        })
    }

    pub fn header(&self) -> &CorpusHeader {
        &self.header
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Byte offset of the first entry line.
    pub fn body_offset(&self) -> u64 {
        self.body.offset
    }

    /// Number of documents, as declared by the header.
    pub fn len(&self) -> u64 {
        self.header.num_docs
    }

    pub fn is_empty(&self) -> bool {
        self.header.num_docs == 0
    }

    fn triples(&mut self) -> Result<Triples<'_, R>> {
        self.source.seek(SeekFrom::Start(self.body.offset))?;
        Ok(Triples::new(
            &mut self.source,
            self.dialect,
            LineCursor::resume(self.body),
        ))
    }

    /// Iterate over all documents with their ids.
    ///
    /// Exactly `num_docs` documents are yielded: ids with no entries in the
    /// file come back as empty documents.
    pub fn iter(&mut self) -> Result<Documents<'_, R>> {
        let num_docs = self.header.num_docs;
        Ok(Documents {
            inner: Grouped::new(self.triples()?, num_docs),
        })
    }

    /// Like [`CorpusReader::iter`], without the ids.
    pub fn docs(&mut self) -> Result<impl Iterator<Item = Result<SparseDoc>> + '_> {
        Ok(self.iter()?.map(|item| item.map(|(_, doc)| doc)))
    }

    /// Read the document whose first entry line starts at byte `offset`.
    ///
    /// Reading stops at the first line of another document, so empty
    /// neighbours are never filled in. An offset at the very end of the file
    /// yields an empty document.
    pub fn read_at(&mut self, offset: u64) -> Result<SparseDoc> {
        self.seek_to_line(offset)?;
        let dialect = self.dialect;
        let cursor = LineCursor::resume(Position { line: None, offset });
        let mut current = None;
        let mut doc = Vec::new();
        for item in Triples::new(&mut self.source, dialect, cursor) {
            let (_, triple) = item?;
            match current {
                None => current = Some(triple.doc),
                Some(id) if id != triple.doc => break,
                Some(_) => {}
            }
            doc.push((triple.term, triple.weight));
        }
        tracing::debug!(offset, doc_id = ?current, entries = doc.len(), "read document by offset");
        Ok(doc)
    }

    fn seek_to_line(&mut self, offset: u64) -> Result<()> {
        if offset < self.body.offset {
            return Err(Error::offset(
                offset,
                format!("inside the header, entries start at {}", self.body.offset),
            ));
        }
        let end = self.source.seek(SeekFrom::End(0))?;
        if offset > end {
            return Err(Error::offset(
                offset,
                format!("past the end of the file ({} bytes)", end),
            ));
        }
        // end of file is where trailing empty documents point, newline or not
        if offset == self.body.offset || offset == end {
            self.source.seek(SeekFrom::Start(offset))?;
            return Ok(());
        }
        self.source.seek(SeekFrom::Start(offset - 1))?;
        let mut previous = [0u8; 1];
        self.source.read_exact(&mut previous)?;
        if previous[0] != b'\n' {
            return Err(Error::offset(offset, "not at the start of a line"));
        }
        Ok(())
    }

    /// Rebuild the offset index of an existing file with one read pass.
    ///
    /// Produces the same slots the writer records: documents without entries
    /// are `None` when another document follows them, and trailing empty
    /// documents point at the end of the file.
    pub fn build_index(&mut self) -> Result<OffsetIndex> {
        let num_docs = self.header.num_docs;
        let mut index = OffsetIndex::with_capacity(num_docs as usize);
        let mut last: Option<DocId> = None;
        let mut triples = self.triples()?;
        for item in triples.by_ref() {
            let (position, triple) = item?;
            if last == Some(triple.doc) {
                continue;
            }
            if last.map_or(false, |prev| triple.doc < prev) || u64::from(triple.doc) >= num_docs {
                return Err(Error::format(
                    position,
                    format!("unexpected document id {}", u64::from(triple.doc) + 1),
                ));
            }
            while (index.len() as u64) <= u64::from(triple.doc) {
                index.record(position.offset);
            }
            last = Some(triple.doc);
        }
        let end = triples.cursor.position().offset;
        while (index.len() as u64) < num_docs {
            index.record(end);
        }
        tracing::info!(documents = index.len(), "rebuilt offset index");
        Ok(index)
    }
}
