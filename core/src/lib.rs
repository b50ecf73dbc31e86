pub mod config;
pub mod corpus;
pub mod guard;
pub mod persist;
pub mod store;
pub mod tokenizer;
pub mod vectorizer;
pub mod weighting;

pub type TermId = i64;
pub type DocId = i64;

/// A vocabulary entry split into its stored components.
///
/// Unigrams leave `secondary` empty; wider grams keep everything after the
/// first space in `secondary`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub primary: String,
    pub secondary: String,
}

impl Term {
    pub fn from_gram(gram: &str) -> Self {
        match gram.split_once(' ') {
            Some((primary, secondary)) => Self { primary: primary.to_string(), secondary: secondary.to_string() },
            None => Self { primary: gram.to_string(), secondary: String::new() },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfRecord {
    pub term_id: TermId,
    pub doc_id: DocId,
    pub weight: f64, // lnc / doc length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unigram_has_empty_secondary() {
        let t = Term::from_gram("graphene");
        assert_eq!(t.primary, "graphene");
        assert_eq!(t.secondary, "");
    }

    #[test]
    fn bigram_splits_on_first_space() {
        let t = Term::from_gram("quantum dot laser");
        assert_eq!(t.primary, "quantum");
        assert_eq!(t.secondary, "dot laser");
    }
}
