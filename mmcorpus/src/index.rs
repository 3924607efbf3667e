use serde::{Deserialize, Serialize};

/// Marker stored on disk for a document whose slot is `None`.
pub const EMPTY_SLOT: i64 = -1;

/// Byte offset of every document's first entry line, in document order.
///
/// A `None` slot marks a document that wrote no entries and therefore shares
/// its position with the next document; reading it needs no I/O. A trailing
/// empty document keeps the end-of-file offset, which reads back as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct OffsetIndex {
    slots: Vec<Option<u64>>,
    last_position: Option<u64>,
}

impl OffsetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            slots: Vec::with_capacity(n),
            last_position: None,
        }
    }

    /// Record the next document as starting at `position`.
    ///
    /// When the previous document started at the same position it wrote
    /// nothing, so its slot is replaced with `None`.
    pub fn record(&mut self, position: u64) {
        if self.last_position == Some(position) {
            if let Some(slot) = self.slots.last_mut() {
                *slot = None;
            }
        }
        self.slots.push(Some(position));
        self.last_position = Some(position);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot of document `docno`, or `None` when past the end.
    pub fn get(&self, docno: usize) -> Option<Option<u64>> {
        self.slots.get(docno).copied()
    }

    pub fn slots(&self) -> &[Option<u64>] {
        &self.slots
    }
}

impl PartialEq for OffsetIndex {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl Eq for OffsetIndex {}

impl From<Vec<Option<u64>>> for OffsetIndex {
    fn from(slots: Vec<Option<u64>>) -> Self {
        let last_position = slots.iter().rev().find_map(|s| *s);
        Self {
            slots,
            last_position,
        }
    }
}

impl TryFrom<Vec<i64>> for OffsetIndex {
    type Error = String;

    fn try_from(raw: Vec<i64>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .map(|v| match v {
                EMPTY_SLOT => Ok(None),
                v if v >= 0 => Ok(Some(v as u64)),
                v => Err(format!("invalid document offset {}", v)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(OffsetIndex::from)
    }
}

impl From<OffsetIndex> for Vec<i64> {
    fn from(index: OffsetIndex) -> Self {
        index
            .slots
            .into_iter()
            .map(|s| s.map_or(EMPTY_SLOT, |v| v as i64))
            .collect()
    }
}
