use anyhow::Result;
use clap::Parser;
use gram_core::config::{DfPolicy, IndexerConfig};
use gram_core::corpus::{load_corpus, IdMapping};
use gram_core::guard::check_size_budget;
use gram_core::persist::{populate, PersistOptions, PersistReport};
use gram_core::store::SqliteStore;
use gram_core::vectorizer::Vectorizer;
use gram_core::weighting::Weighted;
use std::path::PathBuf;

pub const USAGE: &str = "Please specify path to the folder which contains all .tar.gz (--doc-dir)";

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the term-document tf/df tables from archived text files", long_about = None)]
pub struct Cli {
    /// Folder which contains the .tar.gz archives
    #[arg(short = 'd', long)]
    pub doc_dir: Option<PathBuf>,
    /// JSON list of {"arXiv_id", "_id"} records used to rename documents
    #[arg(short = 'm', long)]
    pub mapping_file: Option<PathBuf>,
    /// Insert or update document lengths before writing tf rows
    #[arg(long, default_value_t = false)]
    pub new_docs: bool,
    /// SQLite database path (overrides INDEX_DATABASE and the config file)
    #[arg(long)]
    pub database: Option<String>,
    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Terms per insert call
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Refuse to run once the database reaches this many bytes
    #[arg(long)]
    pub max_db_bytes: Option<u64>,
    /// Words per term
    #[arg(long)]
    pub ngram: Option<usize>,
    /// How df merges with stored values: replace or accumulate
    #[arg(long)]
    pub df_policy: Option<DfPolicy>,
    /// Extra attempts per failed store call
    #[arg(long)]
    pub retries: Option<u32>,
}

impl Cli {
    pub fn config(&self) -> Result<IndexerConfig> {
        let mut cfg = match &self.config {
            Some(path) => IndexerConfig::from_file(path)?,
            None => IndexerConfig::default(),
        };
        cfg.apply_env();
        if let Some(db) = &self.database { cfg.database = db.clone(); }
        if let Some(n) = self.chunk_size { cfg.chunk_size = n; }
        if let Some(n) = self.max_db_bytes { cfg.max_database_bytes = n; }
        if let Some(n) = self.ngram { cfg.ngram_width = n; }
        if let Some(p) = self.df_policy { cfg.df_policy = p; }
        if let Some(n) = self.retries { cfg.max_retries = n; }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// No corpus directory given; nothing was opened or written.
    Usage,
    /// The store is at or over its byte budget; nothing was written.
    OverBudget,
    Indexed(PersistReport),
}

impl Outcome {
    /// Only the size budget turns into a failing status.
    pub fn exit_status(&self) -> u8 {
        match self {
            Outcome::OverBudget => 1,
            Outcome::Usage | Outcome::Indexed(_) => 0,
        }
    }
}

pub fn run(cli: Cli) -> Result<Outcome> {
    let cfg = cli.config()?;

    let Some(doc_dir) = cli.doc_dir.as_deref() else {
        println!("{USAGE}");
        return Ok(Outcome::Usage);
    };

    let mut store = SqliteStore::open(&cfg.database)?.with_df_policy(cfg.df_policy);
    if let Err(e) = check_size_budget(&store, cfg.max_database_bytes) {
        tracing::error!(error = %e, "database is too big, can't fit more data within the limit");
        eprintln!("Database is too big! Can't fit more data within the limit!");
        return Ok(Outcome::OverBudget);
    }

    let mapping = match &cli.mapping_file {
        Some(path) => IdMapping::load(path)?,
        None => IdMapping::default(),
    };
    tracing::info!(mappings = mapping.len(), doc_dir = %doc_dir.display(), "loading corpus");
    let corpus = load_corpus(doc_dir, &mapping)?;
    drop(mapping);

    tracing::info!("calculating raw tf values");
    let vectorized = Vectorizer::new(cfg.ngram_width).fit_transform(corpus);
    tracing::info!(docs = vectorized.text_ids.len(), terms = vectorized.terms.len(), "raw tf values complete");

    tracing::info!("calculating document lengths");
    let index = Weighted::from_vectorized(vectorized);

    let opts = PersistOptions::from_config(&cfg, cli.new_docs);
    let report = populate(&mut store, &index, &opts);
    if report.is_complete() {
        tracing::info!(tf_rows = report.tf_written, "all done");
    } else {
        tracing::warn!(?report, "finished with skipped or failed writes");
    }
    Ok(Outcome::Indexed(report))
}
