use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_MAX_DATABASE_BYTES: u64 = 100 * 1000 * 1000 * 1000; // 100 GB
pub const DATABASE_ENV: &str = "INDEX_DATABASE";

/// How a term's stored df combines with the df of the batch being inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DfPolicy {
    /// Overwrite with the batch value. Re-running a corpus leaves df unchanged.
    #[default]
    Replace,
    /// Add the batch value to what is stored.
    Accumulate,
}

impl std::str::FromStr for DfPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "accumulate" => Ok(Self::Accumulate),
            other => Err(format!("unknown df policy '{other}', expected replace or accumulate")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub database: String,
    pub chunk_size: usize,
    pub max_database_bytes: u64,
    pub ngram_width: usize,
    pub df_policy: DfPolicy,
    pub max_retries: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            database: "index.db".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_database_bytes: DEFAULT_MAX_DATABASE_BYTES,
            ngram_width: 1,
            df_policy: DfPolicy::Replace,
            max_retries: 0,
        }
    }
}

impl IndexerConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let cfg: IndexerConfig = serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// Take the database path from the environment when set.
    pub fn apply_env(&mut self) {
        if let Ok(db) = std::env::var(DATABASE_ENV) {
            if !db.trim().is_empty() {
                self.database = db;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be at least 1");
        }
        if self.ngram_width == 0 {
            bail!("ngram_width must be at least 1");
        }
        Ok(())
    }
}
