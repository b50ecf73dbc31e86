use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 2-20 chars: any word char, then letters, underscore or hyphen.
    static ref RE: Regex = Regex::new(r"\b\w[A-Za-z_-]{1,19}\b").expect("valid regex");
}

/// Lowercase `text` and return its tokens in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    RE.find_iter(&lowered).map(|m| m.as_str().to_string()).collect()
}

/// Join every run of `width` consecutive tokens with a single space.
pub fn ngrams(tokens: &[String], width: usize) -> Vec<String> {
    if width <= 1 {
        return tokens.to_vec();
    }
    tokens.windows(width).map(|w| w.join(" ")).collect()
}
