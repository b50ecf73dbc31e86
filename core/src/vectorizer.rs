use crate::tokenizer::{ngrams, tokenize};
use indexmap::IndexMap;
use sprs::CsMat;
use std::collections::HashMap;

/// Output of [`Vectorizer::fit_transform`]: row `i` of `raw_tf` is
/// `text_ids[i]`, column `j` is `terms[j]`.
#[derive(Debug)]
pub struct Vectorized {
    pub text_ids: Vec<String>,
    pub terms: Vec<String>,
    pub raw_tf: CsMat<u32>,
}

#[derive(Debug, Clone)]
pub struct Vectorizer {
    ngram_width: usize,
}

impl Default for Vectorizer {
    fn default() -> Self { Self { ngram_width: 1 } }
}

impl Vectorizer {
    pub fn new(ngram_width: usize) -> Self { Self { ngram_width: ngram_width.max(1) } }

    /// Count grams per document and build the sorted vocabulary.
    ///
    /// Takes the corpus by value; the texts are dropped as soon as they are
    /// tokenized.
    pub fn fit_transform(self, corpus: IndexMap<String, String>) -> Vectorized {
        let mut provisional: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<Vec<(usize, u32)>> = Vec::with_capacity(corpus.len());
        let mut text_ids = Vec::with_capacity(corpus.len());

        for (text_id, text) in corpus {
            let grams = ngrams(&tokenize(&text), self.ngram_width);
            drop(text);
            let mut counts: HashMap<usize, u32> = HashMap::new();
            for gram in grams {
                let next = provisional.len();
                let id = *provisional.entry(gram).or_insert(next);
                *counts.entry(id).or_insert(0) += 1;
            }
            rows.push(counts.into_iter().collect());
            text_ids.push(text_id);
        }

        // Columns follow lexicographic term order.
        let mut terms: Vec<(String, usize)> = provisional.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let mut remap = vec![0usize; terms.len()];
        for (col, (_, id)) in terms.iter().enumerate() {
            remap[*id] = col;
        }
        let terms: Vec<String> = terms.into_iter().map(|(t, _)| t).collect();

        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in rows {
            let mut row: Vec<(usize, u32)> = row.into_iter().map(|(id, n)| (remap[id], n)).collect();
            row.sort_unstable_by_key(|&(col, _)| col);
            for (col, n) in row {
                indices.push(col);
                data.push(n);
            }
            indptr.push(indices.len());
        }
        let raw_tf = CsMat::new((text_ids.len(), terms.len()), indptr, indices, data);

        tracing::debug!(docs = text_ids.len(), terms = terms.len(), nnz = raw_tf.nnz(), "vectorized corpus");
        Vectorized { text_ids, terms, raw_tf }
    }
}
