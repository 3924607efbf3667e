//! The two on-disk dialects, described as data.
//!
//! A [`Dialect`] carries everything that differs between Matrix Market and UCI
//! files: header shape, the order of the id fields on an entry line, and how
//! weights are coerced. Reader and writer take a `Dialect` value and never
//! look at the format any other way.

use std::io::{self, Write};

use bstr::ByteSlice;

use crate::error::{Error, Position, Result};
use crate::{DocId, TermId};

/// Reserved width of the Matrix Market dimension line, excluding the newline.
pub const MM_HEADER_WIDTH: usize = 50;

/// Reserved width of each UCI header line, excluding the newline.
pub const UCI_HEADER_WIDTH: usize = 20;

/// Weights at or below this magnitude are treated as zero on write.
pub const ZERO_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderShape {
    /// `%%MatrixMarket` tag line, optional `%` comments, one dimension line.
    MatrixMarket,
    /// Three bare lines: documents, terms, non-zeros.
    Uci,
}

/// Order of the two id fields on an entry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrder {
    DocTerm,
    TermDoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightKind {
    /// Decimal weights, written as-is.
    Real,
    /// Integer counts; weights are truncated on write.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub header: HeaderShape,
    pub order: FieldOrder,
    pub weights: WeightKind,
}

/// One decoded entry line, with 0-based ids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triple {
    pub doc: DocId,
    pub term: TermId,
    pub weight: f64,
}

impl Dialect {
    /// Matrix Market coordinate format. `transposed` files list
    /// `doc term weight`, the others `term doc weight`.
    pub const fn matrix_market(transposed: bool) -> Self {
        Self {
            header: HeaderShape::MatrixMarket,
            order: if transposed {
                FieldOrder::DocTerm
            } else {
                FieldOrder::TermDoc
            },
            weights: WeightKind::Real,
        }
    }

    /// UCI bag-of-words format: always `doc term count`.
    pub const fn uci() -> Self {
        Self {
            header: HeaderShape::Uci,
            order: FieldOrder::DocTerm,
            weights: WeightKind::Count,
        }
    }

    pub fn transposed(&self) -> bool {
        self.order == FieldOrder::DocTerm
    }

    /// Reserved bytes per header slot.
    pub fn header_width(&self) -> usize {
        match self.header {
            HeaderShape::MatrixMarket => MM_HEADER_WIDTH,
            HeaderShape::Uci => UCI_HEADER_WIDTH,
        }
    }

    /// Apply the dialect's weight rule. `None` means the entry must not be written.
    pub fn coerce(&self, weight: f64) -> Option<f64> {
        match self.weights {
            WeightKind::Real => (weight.abs() > ZERO_TOLERANCE).then(|| weight),
            WeightKind::Count => {
                let count = weight as i64;
                (count != 0).then(|| count as f64)
            }
        }
    }

    /// Decode one entry line. Blank lines decode to `None`.
    pub fn decode_line(&self, line: &[u8], position: Position) -> Result<Option<Triple>> {
        let mut fields = line.fields();
        let first = match fields.next() {
            Some(f) => f,
            None => return Ok(None),
        };
        let (second, third) = match (fields.next(), fields.next(), fields.next()) {
            (Some(b), Some(c), None) => (b, c),
            _ => {
                return Err(Error::format(
                    position,
                    format!(
                        "expected 3 fields, found {:?}",
                        line.trim().to_str_lossy()
                    ),
                ))
            }
        };
        let (doc, term) = match self.order {
            FieldOrder::DocTerm => (first, second),
            FieldOrder::TermDoc => (second, first),
        };
        Ok(Some(Triple {
            doc: parse_id(doc, "document", position)?,
            term: parse_id(term, "term", position)?,
            weight: self.parse_weight(third, position)?,
        }))
    }

    fn parse_weight(&self, field: &[u8], position: Position) -> Result<f64> {
        let text = field_str(field, position)?;
        let parsed = match self.weights {
            WeightKind::Real => text.parse::<f64>().ok(),
            WeightKind::Count => text.parse::<i64>().ok().map(|c| c as f64),
        };
        parsed.ok_or_else(|| Error::format(position, format!("bad weight {:?}", text)))
    }

    /// Append one entry line for an already-coerced weight, returning the
    /// number of bytes written.
    pub fn encode_entry(
        &self,
        out: &mut Vec<u8>,
        doc: DocId,
        term: TermId,
        weight: f64,
    ) -> io::Result<usize> {
        let start = out.len();
        let (a, b) = match self.order {
            FieldOrder::DocTerm => (u64::from(doc) + 1, u64::from(term) + 1),
            FieldOrder::TermDoc => (u64::from(term) + 1, u64::from(doc) + 1),
        };
        match self.weights {
            WeightKind::Real => writeln!(out, "{} {} {}", a, b, weight)?,
            WeightKind::Count => writeln!(out, "{} {} {}", a, b, weight as i64)?,
        }
        Ok(out.len() - start)
    }
}

fn field_str(field: &[u8], position: Position) -> Result<&str> {
    field
        .to_str()
        .map_err(|_| Error::format(position, "field is not valid UTF-8"))
}

/// Ids are 1-based on disk.
fn parse_id(field: &[u8], what: &str, position: Position) -> Result<u32> {
    let text = field_str(field, position)?;
    match text.parse::<u32>() {
        Ok(0) => Err(Error::format(
            position,
            format!("{} id 0 in a 1-based file", what),
        )),
        Ok(id) => Ok(id - 1),
        Err(_) => Err(Error::format(position, format!("bad {} id {:?}", what, text))),
    }
}
