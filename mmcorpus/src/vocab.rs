//! Plain-text vocabulary files: one word per line, the line number is the id.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use bstr::ByteSlice;

use crate::error::Result;
use crate::TermId;

/// Written for ids that have no word.
pub const MISSING_WORD: &str = "---";

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: Vec<String>,
    /// First id of each word.
    ids: HashMap<String, TermId>,
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl Eq for Vocabulary {}

impl Vocabulary {
    pub fn new(words: Vec<String>) -> Self {
        let mut ids = HashMap::with_capacity(words.len());
        for (id, word) in words.iter().enumerate() {
            ids.entry(word.clone()).or_insert(id as TermId);
        }
        Self { words, ids }
    }

    /// A vocabulary naming every feature by its id.
    pub fn placeholder(num_terms: u64) -> Self {
        Self::new((0..num_terms).map(|id| id.to_string()).collect())
    }

    /// Build from an id to word mapping; ids without a word get [`MISSING_WORD`].
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (TermId, S)>,
        S: Into<String>,
    {
        let mut words: Vec<String> = Vec::new();
        for (id, word) in pairs {
            let id = id as usize;
            if words.len() <= id {
                words.resize(id + 1, MISSING_WORD.to_string());
            }
            words[id] = word.into();
        }
        Self::new(words)
    }

    /// Load one word per line. Bytes that are not UTF-8 are replaced, so every
    /// line keeps its id.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut words = Vec::new();
        for line in reader.split(b'\n') {
            words.push(line?.trim().to_str_lossy().into_owned());
        }
        Ok(Self::new(words))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        tracing::info!(words = self.words.len(), path = %path.display(), "saving vocabulary");
        let mut out = BufWriter::new(File::create(path)?);
        for word in &self.words {
            writeln!(out, "{}", word)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, id: TermId) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    pub fn id(&self, word: &str) -> Option<TermId> {
        self.ids.get(word).copied()
    }
}
