//! Turning a flat stream of entry triples into documents.
//!
//! [`Grouped`] is a state machine over `(next_id, current document)`. It
//! knows nothing about files: anything yielding positioned triples, sorted by
//! document id, can drive it.

use std::mem;

use crate::dialect::Triple;
use crate::error::{Error, Position, Result};
use crate::{DocId, SparseDoc};

/// Yields `(doc_id, document)` for every id in `0..num_docs`, filling ids
/// that have no entries with empty documents.
///
/// Entries of one document must be contiguous and document ids must never
/// decrease; a violation is reported as [`Error::Format`] and ends the
/// iteration.
pub struct Grouped<I> {
    triples: I,
    num_docs: u64,
    next_id: u64,
    current: Option<(DocId, SparseDoc)>,
    exhausted: bool,
    failed: bool,
}

enum Step {
    Append,
    Start,
    Finish,
    OutOfOrder(DocId),
}

impl<I> Grouped<I>
where
    I: Iterator<Item = Result<(Position, Triple)>>,
{
    /// `num_docs` must not exceed `DocId::MAX + 1`; the header parser
    /// guarantees this for values read from a file.
    pub fn new(triples: I, num_docs: u64) -> Self {
        Self {
            triples,
            num_docs,
            next_id: 0,
            current: None,
            exhausted: false,
            failed: false,
        }
    }

    fn empty(&mut self) -> (DocId, SparseDoc) {
        let id = self.next_id as DocId;
        self.next_id += 1;
        (id, Vec::new())
    }

    fn fail(&mut self, err: Error) -> Option<Result<(DocId, SparseDoc)>> {
        self.failed = true;
        self.current = None;
        Some(Err(err))
    }

    fn finish(&mut self, (id, doc): (DocId, SparseDoc)) -> Option<Result<(DocId, SparseDoc)>> {
        self.next_id = u64::from(id) + 1;
        Some(Ok((id, doc)))
    }
}

impl<I> Iterator for Grouped<I>
where
    I: Iterator<Item = Result<(Position, Triple)>>,
{
    type Item = Result<(DocId, SparseDoc)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            // ids skipped over before the document being accumulated
            if let Some((id, _)) = &self.current {
                if self.next_id < u64::from(*id) {
                    return Some(Ok(self.empty()));
                }
            }

            if self.exhausted {
                if let Some(done) = self.current.take() {
                    return self.finish(done);
                }
                if self.next_id < self.num_docs {
                    return Some(Ok(self.empty()));
                }
                return None;
            }

            let (position, triple) = match self.triples.next() {
                None => {
                    self.exhausted = true;
                    continue;
                }
                Some(Err(err)) => return self.fail(err),
                Some(Ok(item)) => item,
            };
            if u64::from(triple.doc) >= self.num_docs {
                let reason = format!(
                    "document id {} beyond the {} documents declared in the header",
                    u64::from(triple.doc) + 1,
                    self.num_docs
                );
                return self.fail(Error::format(position, reason));
            }

            let step = match &self.current {
                Some((id, _)) if *id == triple.doc => Step::Append,
                Some((id, _)) if triple.doc < *id => Step::OutOfOrder(*id),
                Some(_) => Step::Finish,
                None => Step::Start,
            };
            let entry = (triple.term, triple.weight);
            match step {
                Step::Append => {
                    if let Some((_, doc)) = self.current.as_mut() {
                        doc.push(entry);
                    }
                }
                Step::Start => self.current = Some((triple.doc, vec![entry])),
                Step::Finish => {
                    let done = mem::replace(&mut self.current, Some((triple.doc, vec![entry])));
                    if let Some(done) = done {
                        return self.finish(done);
                    }
                }
                Step::OutOfOrder(previous) => {
                    let reason = format!(
                        "document {} follows document {}, entries must be sorted by document",
                        u64::from(triple.doc) + 1,
                        u64::from(previous) + 1
                    );
                    return self.fail(Error::format(position, reason));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(raw: &[(DocId, u32, f64)]) -> Vec<Result<(Position, Triple)>> {
        raw.iter()
            .enumerate()
            .map(|(i, &(doc, term, weight))| {
                let position = Position {
                    line: Some(i as u64 + 1),
                    offset: i as u64 * 10,
                };
                Ok((position, Triple { doc, term, weight }))
            })
            .collect()
    }

    fn group(raw: &[(DocId, u32, f64)], num_docs: u64) -> Vec<Result<(DocId, SparseDoc)>> {
        Grouped::new(triples(raw).into_iter(), num_docs).collect()
    }

    fn docs(raw: &[(DocId, u32, f64)], num_docs: u64) -> Vec<(DocId, SparseDoc)> {
        group(raw, num_docs).into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn groups_contiguous_entries() {
        let got = docs(&[(0, 0, 1.0), (0, 2, 3.0), (1, 1, 2.0)], 2);
        assert_eq!(got, vec![(0, vec![(0, 1.0), (2, 3.0)]), (1, vec![(1, 2.0)])]);
    }

    #[test]
    fn fills_gaps_at_start_middle_and_end() {
        let got = docs(&[(2, 0, 1.0), (5, 3, 4.0)], 8);
        let ids: Vec<DocId> = got.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, (0..8).collect::<Vec<DocId>>());
        let lens: Vec<usize> = got.iter().map(|(_, d)| d.len()).collect();
        assert_eq!(lens, vec![0, 0, 1, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        assert!(docs(&[], 0).is_empty());
    }

    #[test]
    fn declared_documents_without_entries_are_all_yielded() {
        let got = docs(&[], 4);
        let expected: Vec<(DocId, SparseDoc)> = (0..4).map(|i| (i, Vec::new())).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn decreasing_document_ids_fail_and_fuse() {
        let got = group(&[(1, 0, 1.0), (0, 0, 1.0), (2, 0, 1.0)], 3);
        assert!(matches!(got[0], Ok((0, ref d)) if d.is_empty()));
        match &got[1] {
            Err(Error::Format { position, .. }) => assert_eq!(position.line, Some(2)),
            other => panic!("expected format error, got {:?}", other),
        }
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn ids_beyond_header_fail() {
        let got = group(&[(0, 0, 1.0), (1, 0, 1.0), (3, 0, 1.0)], 3);
        assert!(got[0].is_ok());
        assert!(matches!(got[1], Err(Error::Format { .. })));
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn source_errors_are_passed_through() {
        let mut source = triples(&[(0, 0, 1.0)]);
        source.push(Err(Error::format(
            Position {
                line: Some(2),
                offset: 10,
            },
            "bad",
        )));
        let got: Vec<_> = Grouped::new(source.into_iter(), 5).collect();
        assert_eq!(got.len(), 1);
        assert!(got[0].is_err());
    }
}
