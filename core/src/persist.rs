//! Writes one weighted batch into an [`IndexStore`].
//!
//! Phases run strictly in order: document upsert, id resolution, chunked
//! term + df upsert, tf upsert. Each store call commits on its own. A failing
//! call is logged and the run moves on, so a failed run can leave documents
//! or terms behind without their tf rows.

use crate::config::{IndexerConfig, DEFAULT_CHUNK_SIZE};
use crate::store::{self, IndexStore};
use crate::weighting::Weighted;
use crate::{DocId, Term, TermId, TfRecord};
use sprs::CsMat;
use std::fmt::Debug;

const PROGRESS_EVERY: usize = 1_000_000;
const SAMPLE_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure of a store call.
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOptions {
    /// Write document lengths before resolving ids.
    pub new_docs: bool,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self { new_docs: false, chunk_size: DEFAULT_CHUNK_SIZE, retry: RetryPolicy::default() }
    }
}

impl PersistOptions {
    pub fn from_config(cfg: &IndexerConfig, new_docs: bool) -> Self {
        Self { new_docs, chunk_size: cfg.chunk_size, retry: RetryPolicy { max_retries: cfg.max_retries } }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub documents_written: usize,
    pub documents_unresolved: usize,
    pub terms_resolved: usize,
    pub term_chunks: usize,
    pub term_chunks_failed: usize,
    pub tf_records: usize,
    pub tf_written: usize,
    pub document_phase_failed: bool,
    pub tf_phase_failed: bool,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        !self.document_phase_failed && !self.tf_phase_failed && self.term_chunks_failed == 0 && self.documents_unresolved == 0
    }
}

/// Persist `index` into `store`. Store failures are logged, never returned.
pub fn populate<S: IndexStore + ?Sized>(store: &mut S, index: &Weighted, opts: &PersistOptions) -> PersistReport {
    let mut report = PersistReport::default();

    if opts.new_docs {
        let docs: Vec<(String, f64)> = index.text_ids.iter().cloned().zip(index.doc_lengths.iter().copied()).collect();
        tracing::info!(count = docs.len(), "inserting documents");
        match with_retries(opts.retry, "document upsert", || store.upsert_documents(&docs)) {
            Ok(n) => report.documents_written = n,
            Err(e) => {
                report.document_phase_failed = true;
                log_batch_failure("document upsert", &docs, &e);
            }
        }
    }

    tracing::info!("resolving document ids");
    let doc_ids = resolve_doc_ids(&*store, &index.text_ids);
    report.documents_unresolved = doc_ids.iter().filter(|id| id.is_none()).count();

    let terms: Vec<Term> = index.terms.iter().map(|t| Term::from_gram(t)).collect();
    let chunked = insert_terms_chunked(&mut *store, &terms, &index.df, opts.chunk_size, opts.retry);
    drop(terms);
    report.term_chunks = chunked.chunks;
    report.term_chunks_failed = chunked.failed;
    report.terms_resolved = chunked.ids.iter().filter(|id| id.is_some()).count();

    tracing::info!("calculating tf values");
    let records = tf_records(&index.lnc, &index.doc_lengths, &doc_ids, &chunked.ids);
    report.tf_records = records.len();
    tracing::info!(count = records.len(), "inserting tf rows");
    match with_retries(opts.retry, "tf upsert", || store.upsert_tf(&records)) {
        Ok(n) => report.tf_written = n,
        Err(e) => {
            report.tf_phase_failed = true;
            log_batch_failure("tf upsert", &records, &e);
        }
    }

    tracing::info!(?report, "batch persisted");
    report
}

/// Look up every text id. Ids that cannot be resolved are warned about and
/// left as `None`.
pub fn resolve_doc_ids<S: IndexStore + ?Sized>(store: &S, text_ids: &[String]) -> Vec<Option<DocId>> {
    text_ids
        .iter()
        .map(|text_id| match store.resolve_doc_id(text_id) {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                tracing::warn!(text_id = %text_id, "could not find the doc_id for document");
                None
            }
            Err(e) => {
                tracing::error!(text_id = %text_id, error = %e, "failed to get doc_id");
                None
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct ChunkedIds {
    /// Aligned with the input term list; `None` for terms in failed chunks.
    pub ids: Vec<Option<TermId>>,
    pub chunks: usize,
    pub failed: usize,
}

/// Insert terms and their df `chunk_size` at a time, concatenating the
/// returned ids in chunk order.
pub fn insert_terms_chunked<S: IndexStore + ?Sized>(
    store: &mut S,
    terms: &[Term],
    df: &[u32],
    chunk_size: usize,
    retry: RetryPolicy,
) -> ChunkedIds {
    let chunk_size = chunk_size.max(1);
    let total = terms.len();
    tracing::info!(total, chunk_size, "inserting terms");
    let mut out = ChunkedIds { ids: Vec::with_capacity(total), ..Default::default() };

    for (n, (chunk, chunk_df)) in terms.chunks(chunk_size).zip(df.chunks(chunk_size)).enumerate() {
        let start = n * chunk_size;
        out.chunks += 1;
        let result = with_retries(retry, "term upsert", || store.insert_terms_df(chunk, chunk_df));
        match result {
            Ok(ids) if ids.len() == chunk.len() => out.ids.extend(ids.into_iter().map(Some)),
            Ok(ids) => {
                out.failed += 1;
                tracing::error!(start, expected = chunk.len(), returned = ids.len(), "term upsert returned a misaligned id list");
                out.ids.extend(std::iter::repeat(None).take(chunk.len()));
            }
            Err(e) => {
                out.failed += 1;
                tracing::error!(start, end = start + chunk.len(), "term chunk failed");
                log_batch_failure("term upsert", chunk, &e);
                out.ids.extend(std::iter::repeat(None).take(chunk.len()));
            }
        }
        let done = start + chunk.len();
        if done < total && done % PROGRESS_EVERY == 0 {
            tracing::info!(remaining = total - done, "terms remaining");
        }
    }
    // A df list shorter than the term list leaves trailing terms without ids.
    out.ids.resize(total, None);
    out
}

/// One record per stored entry of `lnc` whose document and term resolved and
/// whose weight is finite.
pub fn tf_records(
    lnc: &CsMat<f64>,
    doc_lengths: &[f64],
    doc_ids: &[Option<DocId>],
    term_ids: &[Option<TermId>],
) -> Vec<TfRecord> {
    let mut records = Vec::with_capacity(lnc.nnz());
    for (row, weights) in lnc.outer_iterator().enumerate() {
        let (Some(doc_id), Some(&length)) = (doc_ids.get(row).copied().flatten(), doc_lengths.get(row)) else {
            continue;
        };
        if length <= 0.0 || !length.is_finite() {
            continue;
        }
        for (col, &w) in weights.iter() {
            let Some(term_id) = term_ids.get(col).copied().flatten() else { continue };
            let weight = w / length;
            if weight.is_finite() {
                records.push(TfRecord { term_id, doc_id, weight });
            }
        }
    }
    records
}

fn with_retries<T>(retry: RetryPolicy, phase: &str, mut op: impl FnMut() -> store::Result<T>) -> store::Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < retry.max_retries => {
                attempt += 1;
                tracing::warn!(phase, attempt, error = %e, "store call failed, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

fn log_batch_failure<T: Debug>(phase: &str, batch: &[T], err: &store::StoreError) {
    let head = &batch[..batch.len().min(SAMPLE_LEN)];
    let tail = &batch[batch.len().saturating_sub(SAMPLE_LEN)..];
    tracing::error!(phase, size = batch.len(), first = ?head, last = ?tail, error = %err, "database error during batch write");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_rows_yield_no_records() {
        // [[], [1.0]]
        let lnc: CsMat<f64> = CsMat::new((2, 1), vec![0, 0, 1], vec![0], vec![1.0]);
        let records = tf_records(&lnc, &[0.0, 1.0], &[Some(10), Some(11)], &[Some(7)]);
        assert_eq!(records, vec![TfRecord { term_id: 7, doc_id: 11, weight: 1.0 }]);
    }

    #[test]
    fn unresolved_ids_are_skipped() {
        // [[1.0, 1.0], [0, 2.0]]
        let lnc: CsMat<f64> = CsMat::new((2, 2), vec![0, 2, 3], vec![0, 1, 1], vec![1.0, 1.0, 2.0]);
        let records = tf_records(&lnc, &[2f64.sqrt(), 2.0], &[None, Some(5)], &[Some(1), None]);
        assert!(records.is_empty());
        let records = tf_records(&lnc, &[2f64.sqrt(), 2.0], &[Some(4), Some(5)], &[Some(1), None]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doc_id, 4);
        assert!((records[0].weight - 1.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result = with_retries(RetryPolicy { max_retries: 2 }, "test", || {
            calls += 1;
            if calls < 3 {
                Err(store::StoreError::MisalignedBatch { terms: 1, df: 0 })
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn no_retries_by_default() {
        let mut calls = 0;
        let result: store::Result<()> = with_retries(RetryPolicy::default(), "test", || {
            calls += 1;
            Err(store::StoreError::MisalignedBatch { terms: 1, df: 0 })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
