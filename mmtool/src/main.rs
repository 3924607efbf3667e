use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mmcorpus::persist::save_index;
use mmcorpus::vocab::MISSING_WORD;
use mmcorpus::{
    CorpusHeader, CorpusPaths, CorpusReader, CorpusWriter, Dialect, HeaderShape, IndexedCorpus, Vocabulary,
    WriteOptions,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Matrix Market coordinate
    Mm,
    /// UCI bag-of-words
    Uci,
}

impl Format {
    fn dialect(self, transposed: bool) -> Dialect {
        match self {
            Format::Mm => Dialect::matrix_market(transposed),
            Format::Uci => Dialect::uci(),
        }
    }
}

#[derive(Parser)]
#[command(name = "mmtool")]
#[command(about = "Convert, inspect and index sparse corpus files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a corpus into another file, writing its offset index alongside
    Convert {
        #[arg(long)]
        input: String,
        #[arg(long, value_enum)]
        from: Format,
        /// Matrix Market input lists "doc term weight" instead of "term doc weight"
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        transposed_in: bool,
        #[arg(long)]
        output: String,
        #[arg(long, value_enum)]
        to: Format,
        /// Write Matrix Market output as "doc term weight"
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        transposed_out: bool,
        /// Log progress every N documents
        #[arg(long, default_value_t = 1000)]
        progress: usize,
    },
    /// Print the header counts as JSON
    Stats {
        #[arg(long)]
        input: String,
        #[arg(long, value_enum)]
        dialect: Format,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        transposed: bool,
    },
    /// Print one document, looked up through the offset index, as JSON
    Show {
        #[arg(long)]
        input: String,
        #[arg(long, value_enum)]
        dialect: Format,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        transposed: bool,
        #[arg(long)]
        doc: usize,
    },
    /// Rebuild the offset index of an existing corpus file
    Reindex {
        #[arg(long)]
        input: String,
        #[arg(long, value_enum)]
        dialect: Format,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        transposed: bool,
    },
}

#[derive(Serialize)]
struct Stats {
    #[serde(flatten)]
    header: CorpusHeader,
    density: Option<f64>,
    indexed: bool,
}

#[derive(Serialize)]
struct ShownDoc {
    doc: usize,
    entries: Vec<(u32, f64)>,
    words: Option<Vec<String>>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { input, from, transposed_in, output, to, transposed_out, progress } => {
            convert(&input, from.dialect(transposed_in), &output, to.dialect(transposed_out), progress)
        }
        Commands::Stats { input, dialect, transposed } => stats(&input, dialect.dialect(transposed)),
        Commands::Show { input, dialect, transposed, doc } => show(&input, dialect.dialect(transposed), doc),
        Commands::Reindex { input, dialect, transposed } => reindex(&input, dialect.dialect(transposed)),
    }
}

fn convert(input: &str, from: Dialect, output: &str, to: Dialect, progress: usize) -> Result<()> {
    if input == output {
        bail!("input and output must be different files");
    }
    let mut reader = CorpusReader::open(input, from).with_context(|| format!("opening {}", input))?;
    // keep the declared vocabulary size, unused trailing ids included
    let options = WriteOptions { num_terms: Some(reader.header().num_terms), progress_interval: progress };
    let input_vocab = CorpusPaths::new(input).vocab();
    let vocab = if from.header == HeaderShape::Uci && input_vocab.exists() {
        Some(Vocabulary::load(&input_vocab)?)
    } else {
        None
    };

    let mut writer = CorpusWriter::create(output, to, options)?;
    for doc in reader.docs()? {
        let doc = doc.with_context(|| format!("reading {}", input))?;
        writer.write_doc(&doc)?;
    }
    let summary = writer.finish()?;

    let paths = CorpusPaths::new(output);
    save_index(paths.index(), &summary.offsets)?;
    if to.header == HeaderShape::Uci {
        vocab
            .unwrap_or_else(|| Vocabulary::placeholder(summary.header.num_terms))
            .save(paths.vocab())?;
    }

    tracing::info!(
        output,
        num_docs = summary.header.num_docs,
        num_terms = summary.header.num_terms,
        num_nnz = summary.header.num_nnz,
        "conversion complete"
    );
    Ok(())
}

fn stats(input: &str, dialect: Dialect) -> Result<()> {
    let corpus = IndexedCorpus::open(input, dialect).with_context(|| format!("opening {}", input))?;
    let header = *corpus.header();
    let stats = Stats {
        header,
        density: header.density(),
        indexed: corpus.index().is_some(),
    };
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn show(input: &str, dialect: Dialect, docno: usize) -> Result<()> {
    let mut corpus = IndexedCorpus::open(input, dialect).with_context(|| format!("opening {}", input))?;
    let entries = corpus.get(docno).with_context(|| format!("reading document {}", docno))?;
    let words = corpus.vocab().map(|vocab| {
        entries
            .iter()
            .map(|&(id, _)| vocab.word(id).unwrap_or(MISSING_WORD).to_string())
            .collect()
    });
    let shown = ShownDoc { doc: docno, entries, words };
    println!("{}", serde_json::to_string(&shown)?);
    Ok(())
}

fn reindex(input: &str, dialect: Dialect) -> Result<()> {
    let mut reader = CorpusReader::open(input, dialect).with_context(|| format!("opening {}", input))?;
    let index = reader.build_index()?;
    save_index(CorpusPaths::new(input).index(), &index)?;
    tracing::info!(input, documents = index.len(), "index rebuilt");
    Ok(())
}
