//! Relational store for documents, terms and tf weights.
//!
//! [`IndexStore`] is the write path used by [`crate::persist`]; every batch
//! method is atomic per call. [`SqliteStore`] is the bundled implementation.

use crate::config::DfPolicy;
use crate::{DocId, Term, TermId, TfRecord};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("term batch has {terms} terms but {df} df values")]
    MisalignedBatch { terms: usize, df: usize },
}

pub trait IndexStore {
    /// Total size of the store in bytes.
    fn database_size(&self) -> Result<u64>;

    /// Insert or update `(text_id, length)` rows keyed on `text_id`.
    fn upsert_documents(&mut self, docs: &[(String, f64)]) -> Result<usize>;

    fn resolve_doc_id(&self, text_id: &str) -> Result<Option<DocId>>;

    /// Insert the terms with their df and return the id of every term, in
    /// input order, whether it was created now or already existed.
    fn insert_terms_df(&mut self, terms: &[Term], df: &[u32]) -> Result<Vec<TermId>>;

    /// Insert or overwrite tf weights keyed on `(term_id, doc_id)`.
    fn upsert_tf(&mut self, records: &[TfRecord]) -> Result<usize>;
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS document (
    _id INTEGER PRIMARY KEY,
    text_id TEXT NOT NULL UNIQUE,
    length REAL NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS bigram (
    _id INTEGER PRIMARY KEY,
    term1 TEXT NOT NULL,
    term2 TEXT NOT NULL DEFAULT '',
    df INTEGER NOT NULL DEFAULT 0,
    UNIQUE (term1, term2)
);
CREATE TABLE IF NOT EXISTS tf (
    gram_id INTEGER NOT NULL REFERENCES bigram(_id),
    doc_id INTEGER NOT NULL REFERENCES document(_id),
    lnc REAL NOT NULL,
    UNIQUE (gram_id, doc_id)
);
";

pub struct SqliteStore {
    conn: Connection,
    df_policy: DfPolicy,
}

impl SqliteStore {
    /// Open or create the store at `path` and make sure the tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", 1)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn, df_policy: DfPolicy::default() })
    }

    pub fn with_df_policy(mut self, df_policy: DfPolicy) -> Self {
        self.df_policy = df_policy;
        self
    }
}

/// Read-back helpers used by tests.
#[cfg(any(test, feature = "test-support"))]
impl SqliteStore {
    pub fn document_length(&self, text_id: &str) -> Result<Option<f64>> {
        let length = self
            .conn
            .query_row("SELECT length FROM document WHERE text_id = ?1", params![text_id], |row| row.get(0))
            .optional()?;
        Ok(length)
    }

    /// Stored `(id, df)` of a term.
    pub fn term(&self, term: &Term) -> Result<Option<(TermId, u32)>> {
        let found = self
            .conn
            .query_row(
                "SELECT _id, df FROM bigram WHERE term1 = ?1 AND term2 = ?2",
                params![term.primary, term.secondary],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(found)
    }

    pub fn tf_weight(&self, term_id: TermId, doc_id: DocId) -> Result<Option<f64>> {
        let weight = self
            .conn
            .query_row("SELECT lnc FROM tf WHERE gram_id = ?1 AND doc_id = ?2", params![term_id, doc_id], |row| row.get(0))
            .optional()?;
        Ok(weight)
    }

    pub fn row_count(&self, table: Table) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Document,
    Bigram,
    Tf,
}

#[cfg(any(test, feature = "test-support"))]
impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Document => "document",
            Table::Bigram => "bigram",
            Table::Tf => "tf",
        }
    }
}

impl IndexStore for SqliteStore {
    fn database_size(&self) -> Result<u64> {
        let pages: i64 = self.conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((pages.max(0) as u64) * (page_size.max(0) as u64))
    }

    fn upsert_documents(&mut self, docs: &[(String, f64)]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO document (text_id, length) VALUES (?1, ?2)
                 ON CONFLICT(text_id) DO UPDATE SET length = excluded.length",
            )?;
            for (text_id, length) in docs {
                stmt.execute(params![text_id, length])?;
            }
        }
        tx.commit()?;
        Ok(docs.len())
    }

    fn resolve_doc_id(&self, text_id: &str) -> Result<Option<DocId>> {
        let id = self
            .conn
            .query_row("SELECT _id FROM document WHERE text_id = ?1", params![text_id], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn insert_terms_df(&mut self, terms: &[Term], df: &[u32]) -> Result<Vec<TermId>> {
        if terms.len() != df.len() {
            return Err(StoreError::MisalignedBatch { terms: terms.len(), df: df.len() });
        }
        let sql = match self.df_policy {
            DfPolicy::Replace => {
                "INSERT INTO bigram (term1, term2, df) VALUES (?1, ?2, ?3)
                 ON CONFLICT(term1, term2) DO UPDATE SET df = excluded.df
                 RETURNING _id"
            }
            DfPolicy::Accumulate => {
                "INSERT INTO bigram (term1, term2, df) VALUES (?1, ?2, ?3)
                 ON CONFLICT(term1, term2) DO UPDATE SET df = bigram.df + excluded.df
                 RETURNING _id"
            }
        };
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(terms.len());
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for (term, df) in terms.iter().zip(df) {
                let id: TermId = stmt.query_row(params![term.primary, term.secondary, df], |row| row.get(0))?;
                ids.push(id);
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn upsert_tf(&mut self, records: &[TfRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO tf (gram_id, doc_id, lnc) VALUES (?1, ?2, ?3)
                 ON CONFLICT(gram_id, doc_id) DO UPDATE SET lnc = excluded.lnc",
            )?;
            for r in records {
                stmt.execute(params![r.term_id, r.doc_id, r.weight])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<Term> {
        words.iter().map(|w| Term::from_gram(w)).collect()
    }

    #[test]
    fn document_upsert_updates_length_in_place() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert_documents(&[("a".into(), 1.0), ("b".into(), 2.0)]).unwrap();
        let id = store.resolve_doc_id("a").unwrap();
        store.upsert_documents(&[("a".into(), 3.5)]).unwrap();
        assert_eq!(store.resolve_doc_id("a").unwrap(), id);
        assert_eq!(store.document_length("a").unwrap(), Some(3.5));
        assert_eq!(store.row_count(Table::Document).unwrap(), 2);
        assert_eq!(store.resolve_doc_id("missing").unwrap(), None);
    }

    #[test]
    fn term_ids_are_stable_across_calls() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = store.insert_terms_df(&terms(&["cat", "dog"]), &[1, 2]).unwrap();
        let second = store.insert_terms_df(&terms(&["dog", "eel", "cat"]), &[1, 1, 1]).unwrap();
        assert_eq!(second[0], first[1]);
        assert_eq!(second[2], first[0]);
        assert!(!first.contains(&second[1]));
        assert_eq!(store.term(&Term::from_gram("dog")).unwrap(), Some((first[1], 1)));
    }

    #[test]
    fn accumulate_policy_adds_df() {
        let mut store = SqliteStore::open_in_memory().unwrap().with_df_policy(DfPolicy::Accumulate);
        store.insert_terms_df(&terms(&["cat"]), &[2]).unwrap();
        store.insert_terms_df(&terms(&["cat"]), &[3]).unwrap();
        assert_eq!(store.term(&Term::from_gram("cat")).unwrap().map(|(_, df)| df), Some(5));
    }

    #[test]
    fn misaligned_term_batch_is_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = store.insert_terms_df(&terms(&["cat", "dog"]), &[1]).unwrap_err();
        assert!(matches!(err, StoreError::MisalignedBatch { terms: 2, df: 1 }));
        assert_eq!(store.row_count(Table::Bigram).unwrap(), 0);
    }

    #[test]
    fn failed_tf_batch_rolls_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert_documents(&[("a".into(), 1.0)]).unwrap();
        let doc = store.resolve_doc_id("a").unwrap().unwrap();
        let gram = store.insert_terms_df(&terms(&["cat"]), &[1]).unwrap()[0];
        let records = vec![
            TfRecord { term_id: gram, doc_id: doc, weight: 1.0 },
            TfRecord { term_id: gram + 1000, doc_id: doc, weight: 0.5 },
        ];
        assert!(store.upsert_tf(&records).is_err());
        assert_eq!(store.row_count(Table::Tf).unwrap(), 0);
    }

    #[test]
    fn size_is_positive_once_schema_exists() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.database_size().unwrap() > 0);
    }
}
