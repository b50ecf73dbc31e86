//! Corpus loading from a directory of `.tar.gz` archives.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

const ARCHIVE_SUFFIX: &str = ".tar.gz";
const MEMBER_SUFFIX: &str = ".preproc";

/// Text id → text, in the order documents were first seen.
pub type Corpus = IndexMap<String, String>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MappingRecord {
    #[serde(alias = "arXiv_id")]
    external_id: Option<RawId>,
    #[serde(alias = "_id")]
    internal_id: Option<RawId>,
}

/// Rewrites external document ids to the store's canonical ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdMapping {
    map: HashMap<String, String>,
}

impl IdMapping {
    /// Parse the first non-empty line of `path` as a JSON array of
    /// `{"arXiv_id": .., "_id": ..}` records.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("reading mapping file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing mapping file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let Some(line) = raw.lines().find(|l| !l.trim().is_empty()) else {
            return Ok(Self::default());
        };
        let records: Vec<MappingRecord> = serde_json::from_str(line)?;
        let mut map = HashMap::with_capacity(records.len());
        for (i, rec) in records.into_iter().enumerate() {
            let (Some(external), Some(internal)) = (rec.external_id, rec.internal_id) else {
                bail!("mapping record {i} needs both an external and an internal id");
            };
            // first record for an external id wins
            map.entry(external.into_string()).or_insert_with(|| internal.into_string());
        }
        Ok(Self { map })
    }

    pub fn resolve<'a>(&'a self, text_id: &'a str) -> &'a str {
        self.map.get(text_id).map(String::as_str).unwrap_or(text_id)
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

/// Text id for an archive member: base name without the `.preproc` suffix.
pub fn member_text_id(member_path: &Path) -> Option<String> {
    let name = member_path.file_name()?.to_str()?;
    Some(name.strip_suffix(MEMBER_SUFFIX).unwrap_or(name).to_string())
}

pub fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

/// Read every regular file from every `.tar.gz` under `root`.
///
/// Unreadable archives and non UTF-8 members are logged and skipped.
pub fn load_corpus<P: AsRef<Path>>(root: P, mapping: &IdMapping) -> Result<Corpus> {
    let root = root.as_ref();
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let mut corpus = Corpus::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        let is_archive = p.file_name().and_then(|s| s.to_str()).is_some_and(|n| n.ends_with(ARCHIVE_SUFFIX));
        if !entry.file_type().is_file() || !is_archive {
            continue;
        }
        if let Err(e) = load_archive(p, mapping, &mut corpus) {
            tracing::error!(archive = %p.display(), error = %e, "failed to read archive");
        }
    }
    tracing::info!(documents = corpus.len(), "processing complete");
    Ok(corpus)
}

fn load_archive(path: &Path, mapping: &IdMapping, corpus: &mut Corpus) -> Result<()> {
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for member in archive.entries()? {
        let mut member = member?;
        if !member.header().entry_type().is_file() {
            continue;
        }
        let member_path = member.path()?.into_owned();
        let Some(text_id) = member_text_id(&member_path) else { continue };
        let mut bytes = Vec::new();
        member.read_to_end(&mut bytes)?;
        let text = match String::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(member = %member_path.display(), "skipping member that is not valid UTF-8");
                continue;
            }
        };
        tracing::debug!(member = %member_path.display(), "processing");
        let text_id = mapping.resolve(&text_id).to_string();
        corpus.insert(text_id, strip_punctuation(&text));
    }
    Ok(())
}
