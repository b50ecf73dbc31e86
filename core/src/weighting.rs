//! Sublinear tf weighting, document lengths and document frequencies.

use crate::vectorizer::Vectorized;
use sprs::CsMat;

/// Everything the persistence layer needs, derived from one vectorized batch.
#[derive(Debug)]
pub struct Weighted {
    pub text_ids: Vec<String>,
    pub terms: Vec<String>,
    pub lnc: CsMat<f64>,
    pub doc_lengths: Vec<f64>,
    pub df: Vec<u32>,
}

impl Weighted {
    /// Consumes the raw counts; only the weighted matrix is kept.
    pub fn from_vectorized(v: Vectorized) -> Self {
        let Vectorized { text_ids, terms, raw_tf } = v;
        let lnc = sublinear_tf(&raw_tf);
        drop(raw_tf);
        let doc_lengths = document_lengths(&lnc);
        let df = document_frequencies(&lnc);
        Self { text_ids, terms, lnc, doc_lengths, df }
    }
}

/// `1 + ln(count)` for every stored count. No idf, no renormalization.
pub fn sublinear_tf(raw_tf: &CsMat<u32>) -> CsMat<f64> {
    raw_tf.map(|&count| if count > 0 { 1.0 + f64::from(count).ln() } else { 0.0 })
}

/// Euclidean norm of every row. Rows without entries have length 0.
pub fn document_lengths(lnc: &CsMat<f64>) -> Vec<f64> {
    lnc.outer_iterator()
        .map(|row| row.iter().map(|(_, &w)| w * w).sum::<f64>().sqrt())
        .collect()
}

/// Number of rows with a non-zero weight, per column.
pub fn document_frequencies(lnc: &CsMat<f64>) -> Vec<u32> {
    let mut df = vec![0u32; lnc.cols()];
    for (&col, &w) in lnc.indices().iter().zip(lnc.data()) {
        if w != 0.0 {
            df[col] += 1;
        }
    }
    df
}
