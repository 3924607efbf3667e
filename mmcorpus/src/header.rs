//! Corpus header: parsing, placeholder reservation and back-patching.
//!
//! Totals are only known once every document has been written, so the writer
//! first reserves fixed-width blank slots and overwrites them at the end. The
//! reserved widths are hard limits; a count that does not fit is an error and
//! never gets truncated.

use std::io::{BufRead, Seek, SeekFrom, Write};

use bstr::ByteSlice;
use serde::Serialize;

use crate::dialect::{Dialect, HeaderShape};
use crate::error::{Error, Position, Result};
use crate::reader::LineCursor;
use crate::DocId;

/// Tag line written at the top of every Matrix Market file.
pub const MM_TAG: &[u8] = b"%%MatrixMarket matrix coordinate real general\n";

const MM_TAG_PREFIX: &[u8] = b"%%matrixmarket matrix coordinate";
const MM_COMMENT: u8 = b'%';

/// Largest document count addressable with [`DocId`].
pub const MAX_DOCS: u64 = DocId::MAX as u64 + 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusHeader {
    pub num_docs: u64,
    pub num_terms: u64,
    pub num_nnz: u64,
}

impl CorpusHeader {
    /// Fraction of cells that are non-zero, or `None` for an empty matrix.
    pub fn density(&self) -> Option<f64> {
        let cells = self.num_docs as f64 * self.num_terms as f64;
        (cells > 0.0).then(|| self.num_nnz as f64 / cells)
    }
}

/// Blank header slots written by [`write_placeholder`].
#[derive(Debug, Clone)]
pub struct HeaderReservation {
    dialect: Dialect,
    slots: Vec<u64>,
    body_offset: u64,
}

impl HeaderReservation {
    /// Byte offset right after the reserved header, where entry lines begin.
    pub fn body_offset(&self) -> u64 {
        self.body_offset
    }
}

/// Parse the header from the start of `source`, leaving the stream at the
/// first entry line. Returns the header and the position of the body.
pub fn parse_header<R: BufRead>(
    source: &mut R,
    dialect: &Dialect,
) -> Result<(CorpusHeader, Position)> {
    let mut cursor = LineCursor::at_start();
    let header = match dialect.header {
        HeaderShape::MatrixMarket => parse_mm(source, dialect, &mut cursor)?,
        HeaderShape::Uci => parse_uci(source, &mut cursor)?,
    };
    if header.num_docs > MAX_DOCS {
        return Err(Error::format(
            cursor.position(),
            format!(
                "{} documents declared, at most {} are supported",
                header.num_docs, MAX_DOCS
            ),
        ));
    }
    tracing::info!(
        num_docs = header.num_docs,
        num_terms = header.num_terms,
        num_nnz = header.num_nnz,
        "accepted corpus"
    );
    Ok((header, cursor.position()))
}

fn header_line<R: BufRead>(source: &mut R, cursor: &mut LineCursor) -> Result<Position> {
    cursor.advance(source)?.ok_or_else(|| {
        Error::format(
            cursor.position(),
            "unexpected end of file inside the header",
        )
    })
}

fn parse_mm<R: BufRead>(
    source: &mut R,
    dialect: &Dialect,
    cursor: &mut LineCursor,
) -> Result<CorpusHeader> {
    let position = header_line(source, cursor)?;
    if !cursor.line().to_ascii_lowercase().starts_with(MM_TAG_PREFIX) {
        return Err(Error::format(
            position,
            format!(
                "not a Matrix Market coordinate file, found {:?}",
                cursor.line().trim().to_str_lossy()
            ),
        ));
    }

    let position = loop {
        let position = header_line(source, cursor)?;
        if cursor.line().first() != Some(&MM_COMMENT) {
            break position;
        }
    };
    let [rows, cols, num_nnz] = parse_counts(cursor.line(), position)?;
    let (num_docs, num_terms) = if dialect.transposed() {
        (rows, cols)
    } else {
        (cols, rows)
    };
    Ok(CorpusHeader {
        num_docs,
        num_terms,
        num_nnz,
    })
}

fn parse_uci<R: BufRead>(source: &mut R, cursor: &mut LineCursor) -> Result<CorpusHeader> {
    let mut values = [0u64; 3];
    for value in values.iter_mut() {
        let position = header_line(source, cursor)?;
        *value = parse_count(cursor.line().trim(), position)?;
    }
    let [num_docs, num_terms, num_nnz] = values;
    Ok(CorpusHeader {
        num_docs,
        num_terms,
        num_nnz,
    })
}

fn parse_counts(line: &[u8], position: Position) -> Result<[u64; 3]> {
    let fields: Vec<&[u8]> = line.fields().collect();
    if fields.len() != 3 {
        return Err(Error::format(
            position,
            format!(
                "expected 3 header counts, found {:?}",
                line.trim().to_str_lossy()
            ),
        ));
    }
    Ok([
        parse_count(fields[0], position)?,
        parse_count(fields[1], position)?,
        parse_count(fields[2], position)?,
    ])
}

fn parse_count(field: &[u8], position: Position) -> Result<u64> {
    field
        .to_str()
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| {
            Error::format(
                position,
                format!("bad header count {:?}", field.to_str_lossy()),
            )
        })
}

/// Write blank header slots at the sink's current position.
pub fn write_placeholder<W: Write + Seek>(sink: &mut W, dialect: &Dialect) -> Result<HeaderReservation> {
    let start = sink.stream_position()?;
    let width = dialect.header_width();
    let mut blank = vec![b' '; width];
    blank.push(b'\n');

    let mut slots = Vec::with_capacity(3);
    let mut pos = start;
    match dialect.header {
        HeaderShape::MatrixMarket => {
            sink.write_all(MM_TAG)?;
            pos += MM_TAG.len() as u64;
            slots.push(pos);
            sink.write_all(&blank)?;
            pos += blank.len() as u64;
        }
        HeaderShape::Uci => {
            for _ in 0..3 {
                slots.push(pos);
                sink.write_all(&blank)?;
                pos += blank.len() as u64;
            }
        }
    }
    Ok(HeaderReservation {
        dialect: *dialect,
        slots,
        body_offset: pos,
    })
}

fn slot_values(dialect: &Dialect, header: &CorpusHeader) -> Vec<String> {
    match dialect.header {
        HeaderShape::MatrixMarket => {
            let (rows, cols) = if dialect.transposed() {
                (header.num_docs, header.num_terms)
            } else {
                (header.num_terms, header.num_docs)
            };
            vec![format!("{} {} {}", rows, cols, header.num_nnz)]
        }
        HeaderShape::Uci => vec![
            header.num_docs.to_string(),
            header.num_terms.to_string(),
            header.num_nnz.to_string(),
        ],
    }
}

/// Overwrite the reserved slots with the final counts, then seek back to the end.
///
/// Every value is checked against the reserved width before anything is
/// written, so an oversized count leaves the placeholder untouched.
pub fn patch_header<W: Write + Seek>(
    sink: &mut W,
    reservation: &HeaderReservation,
    header: &CorpusHeader,
) -> Result<()> {
    let width = reservation.dialect.header_width();
    let values = slot_values(&reservation.dialect, header);
    if let Some(value) = values.iter().find(|v| v.len() > width) {
        return Err(Error::Encoding {
            value: value.clone(),
            width,
        });
    }
    for (slot, value) in reservation.slots.iter().zip(&values) {
        tracing::debug!(offset = slot, value = value.as_str(), "patching header slot");
        sink.seek(SeekFrom::Start(*slot))?;
        sink.write_all(value.as_bytes())?;
    }
    sink.seek(SeekFrom::End(0))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(num_docs: u64, num_terms: u64, num_nnz: u64) -> CorpusHeader {
        CorpusHeader {
            num_docs,
            num_terms,
            num_nnz,
        }
    }

    #[test]
    fn mm_skips_comments_and_swaps_when_not_transposed() {
        let text = b"%%MatrixMarket matrix coordinate real general\n% made by hand\n%\n9 4 2\n1 1 1.0\n";
        let (h, body) = parse_header(&mut &text[..], &Dialect::matrix_market(true)).unwrap();
        assert_eq!(h, header(9, 4, 2));
        assert_eq!(body.line, Some(5));
        assert_eq!(&text[body.offset as usize..], b"1 1 1.0\n");

        let (h, _) = parse_header(&mut &text[..], &Dialect::matrix_market(false)).unwrap();
        assert_eq!(h, header(4, 9, 2));
    }

    #[test]
    fn mm_requires_tag() {
        let text = b"9 4 2\n1 1 1.0\n";
        assert!(matches!(
            parse_header(&mut &text[..], &Dialect::matrix_market(true)),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn uci_reads_three_trimmed_lines() {
        let text = b"3          \n7   \n12\n1 1 2\n";
        let (h, body) = parse_header(&mut &text[..], &Dialect::uci()).unwrap();
        assert_eq!(h, header(3, 7, 12));
        assert_eq!(body.offset, 20);
    }

    #[test]
    fn unpatched_placeholder_is_rejected() {
        for dialect in [Dialect::matrix_market(true), Dialect::uci()] {
            let mut sink = Cursor::new(Vec::new());
            write_placeholder(&mut sink, &dialect).unwrap();
            let bytes = sink.into_inner();
            assert!(matches!(
                parse_header(&mut &bytes[..], &dialect),
                Err(Error::Format { .. })
            ));
        }
    }

    #[test]
    fn patch_keeps_file_length_and_body() {
        for dialect in [
            Dialect::matrix_market(true),
            Dialect::matrix_market(false),
            Dialect::uci(),
        ] {
            let mut sink = Cursor::new(Vec::new());
            let reservation = write_placeholder(&mut sink, &dialect).unwrap();
            sink.write_all(b"1 1 1\n").unwrap();
            let before = sink.get_ref().len();

            let expected = header(123_456, 7, 1);
            patch_header(&mut sink, &reservation, &expected).unwrap();
            let bytes = sink.into_inner();
            assert_eq!(bytes.len(), before);

            let (parsed, body) = parse_header(&mut &bytes[..], &dialect).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(body.offset, reservation.body_offset());
            assert_eq!(&bytes[body.offset as usize..], b"1 1 1\n");
        }
    }

    #[test]
    fn oversized_counts_fail_without_touching_placeholder() {
        let dialect = Dialect::matrix_market(true);
        let mut sink = Cursor::new(Vec::new());
        let reservation = write_placeholder(&mut sink, &dialect).unwrap();
        let snapshot = sink.get_ref().clone();

        let huge = header(u64::MAX, u64::MAX, u64::MAX);
        match patch_header(&mut sink, &reservation, &huge) {
            Err(Error::Encoding { width, .. }) => assert_eq!(width, 50),
            other => panic!("expected encoding error, got {:?}", other),
        }
        assert_eq!(sink.into_inner(), snapshot);
    }

    #[test]
    fn density_of_empty_matrix_is_undefined() {
        assert_eq!(header(0, 5, 0).density(), None);
        assert_eq!(header(2, 5, 5).density(), Some(0.5));
    }
}
