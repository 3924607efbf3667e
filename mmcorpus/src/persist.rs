use crate::dialect::{Dialect, HeaderShape};
use crate::error::{Error, Result};
use crate::header::CorpusHeader;
use crate::index::OffsetIndex;
use crate::reader::{CorpusReader, Documents};
use crate::vocab::Vocabulary;
use crate::writer::{CorpusWriter, WriteOptions, WriteSummary};
use crate::{Entry, SparseDoc};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// A corpus file and its side files.
#[derive(Debug, Clone)]
pub struct CorpusPaths {
    corpus: PathBuf,
}

impl CorpusPaths {
    pub fn new<P: AsRef<Path>>(corpus: P) -> Self {
        Self { corpus: corpus.as_ref().to_path_buf() }
    }
    pub fn corpus(&self) -> &Path { &self.corpus }
    pub fn index(&self) -> PathBuf { with_suffix(&self.corpus, ".index") }
    pub fn vocab(&self) -> PathBuf { with_suffix(&self.corpus, ".vocab") }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

pub fn save_index<P: AsRef<Path>>(path: P, index: &OffsetIndex) -> Result<()> {
    let mut f = File::create(path.as_ref())?;
    let bytes = bincode::serialize(index)?;
    f.write_all(&bytes)?;
    tracing::info!(documents = index.len(), path = %path.as_ref().display(), "saved offset index");
    Ok(())
}

pub fn load_index<P: AsRef<Path>>(path: P) -> Result<OffsetIndex> {
    let mut f = File::open(path.as_ref())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index: OffsetIndex = bincode::deserialize(&buf)?;
    tracing::info!(documents = index.len(), path = %path.as_ref().display(), "loaded offset index");
    Ok(index)
}

/// A corpus file opened together with its offset index, giving access to
/// documents by number as well as by iteration.
pub struct IndexedCorpus {
    paths: CorpusPaths,
    reader: CorpusReader<BufReader<File>>,
    index: Option<OffsetIndex>,
    vocab: Option<Vocabulary>,
}

impl IndexedCorpus {
    /// Write `docs` to `path` together with its `.index` side file.
    ///
    /// UCI corpora also get a `.vocab` file: `vocab` when given, otherwise
    /// one placeholder word per feature id. A supplied vocabulary also fixes
    /// the header's term count.
    pub fn serialize<P, I, D>(
        path: P,
        dialect: Dialect,
        docs: I,
        vocab: Option<&Vocabulary>,
        progress_interval: usize,
    ) -> Result<WriteSummary>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = D>,
        D: AsRef<[Entry]>,
    {
        let paths = CorpusPaths::new(path);
        let options = WriteOptions {
            num_terms: vocab.map(|v| v.len() as u64),
            progress_interval,
        };
        let mut writer = CorpusWriter::create(paths.corpus(), dialect, options)?;
        for doc in docs {
            writer.write_doc(doc.as_ref())?;
        }
        let summary = writer.finish()?;
        save_index(paths.index(), &summary.offsets)?;

        if dialect.header == HeaderShape::Uci {
            match vocab {
                Some(vocab) => vocab.save(paths.vocab())?,
                None => Vocabulary::placeholder(summary.header.num_terms).save(paths.vocab())?,
            }
        }
        Ok(summary)
    }

    /// Open a corpus, loading its offset index and vocabulary when present.
    pub fn open<P: AsRef<Path>>(path: P, dialect: Dialect) -> Result<Self> {
        let paths = CorpusPaths::new(path);
        let reader = CorpusReader::open(paths.corpus(), dialect)?;

        let index_path = paths.index();
        let index = if index_path.exists() {
            let index = load_index(&index_path)?;
            if index.len() as u64 != reader.len() {
                tracing::warn!(
                    index = index.len(),
                    header = reader.len(),
                    "offset index and header disagree on the document count"
                );
            }
            Some(index)
        } else {
            tracing::info!(path = %index_path.display(), "no offset index, random access disabled");
            None
        };

        let vocab_path = paths.vocab();
        let vocab = if dialect.header == HeaderShape::Uci && vocab_path.exists() {
            Some(Vocabulary::load(&vocab_path)?)
        } else {
            None
        };

        Ok(Self { paths, reader, index, vocab })
    }

    pub fn paths(&self) -> &CorpusPaths { &self.paths }
    pub fn header(&self) -> &CorpusHeader { self.reader.header() }
    pub fn index(&self) -> Option<&OffsetIndex> { self.index.as_ref() }
    pub fn vocab(&self) -> Option<&Vocabulary> { self.vocab.as_ref() }

    /// Number of documents: the index length when loaded, else the header count.
    pub fn len(&self) -> usize {
        match &self.index {
            Some(index) => index.len(),
            None => self.reader.len() as usize,
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Fetch document `docno` through the offset index.
    pub fn get(&mut self, docno: usize) -> Result<SparseDoc> {
        let index = self.index.as_ref().ok_or(Error::MissingIndex)?;
        let slot = index
            .get(docno)
            .ok_or(Error::DocumentOutOfRange { docno, len: index.len() })?;
        match slot {
            Some(offset) => self.reader.read_at(offset),
            None => Ok(Vec::new()),
        }
    }

    /// Fetch several documents by number, in the order given.
    pub fn get_many(&mut self, docnos: &[usize]) -> Result<Vec<SparseDoc>> {
        docnos.iter().map(|&docno| self.get(docno)).collect()
    }

    pub fn iter(&mut self) -> Result<Documents<'_, BufReader<File>>> { self.reader.iter() }

    pub fn docs(&mut self) -> Result<impl Iterator<Item = Result<SparseDoc>> + '_> { self.reader.docs() }
}
