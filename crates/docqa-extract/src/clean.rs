//! Text normalisation applied before chunking.

use regex::Regex;
use std::sync::OnceLock;

fn special_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[^\w\s.,!?'":;()\-]"#).expect("Invalid regex"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex"))
}

/// Drop characters other than word characters, whitespace and basic
/// punctuation, then collapse whitespace runs to single spaces.
pub fn clean_text(text: &str) -> String {
    let stripped = special_chars().replace_all(text, "");
    whitespace().replace_all(&stripped, " ").trim().to_string()
}
