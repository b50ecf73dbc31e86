use gram_core::tokenizer::tokenize;

#[test]
fn it_lowercases_and_keeps_order() {
    let toks = tokenize("Graphene SHEETS and graphene");
    assert_eq!(toks, vec!["graphene", "sheets", "and", "graphene"]);
}

#[test]
fn it_enforces_token_length() {
    let toks = tokenize("a an abcdefghijklmnopqrst abcdefghijklmnopqrstu");
    // single chars and 21-char words never match
    assert_eq!(toks, vec!["an", "abcdefghijklmnopqrst"]);
}

#[test]
fn it_allows_leading_digit_and_inner_hyphen() {
    let toks = tokenize("1st spin-orbit x2 under_score");
    assert!(toks.contains(&"1st".to_string()));
    assert!(toks.contains(&"spin-orbit".to_string()));
    assert!(toks.contains(&"under_score".to_string()));
    assert!(!toks.iter().any(|t| t.starts_with("x2")));
}
