//! Frequency-based keyword extraction.
//!
//! Used for the fallback cluster title and for summary key concepts.

use std::collections::HashMap;

/// Tokens must be longer than this to count as keywords
const MIN_KEYWORD_LEN: usize = 4;

/// Tokenize text into lowercase keyword candidates.
///
/// Splits on whitespace, strips non-word characters, and drops stop words,
/// digit-only tokens and tokens of four characters or fewer.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|s| s.chars().count() > MIN_KEYWORD_LEN)
        .filter(|s| !s.chars().all(|c| c.is_numeric()))
        .filter(|s| !is_stop_word(s))
        .collect()
}

/// Rank tokens across `texts` by frequency; ties keep first-occurrence order.
pub fn ranked_keywords<S: AsRef<str>>(texts: &[S]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut position = 0usize;

    for text in texts {
        for token in tokenize(text.as_ref()) {
            let entry = counts.entry(token).or_insert((0, position));
            entry.0 += 1;
            position += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked.into_iter().map(|(token, count, _)| (token, count)).collect()
}

/// Title from the one or two most frequent keywords, e.g. "Rust Ownership".
pub fn keyword_title<S: AsRef<str>>(texts: &[S]) -> Option<String> {
    let ranked = ranked_keywords(texts);
    if ranked.is_empty() {
        return None;
    }
    Some(
        ranked
            .iter()
            .take(2)
            .map(|(word, _)| capitalize(word))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Key concepts for summaries: keywords that are not -ing/-ed verb forms.
pub fn key_concepts<S: AsRef<str>>(texts: &[S], limit: usize) -> Vec<String> {
    ranked_keywords(texts)
        .into_iter()
        .map(|(word, _)| word)
        .filter(|w| !w.ends_with("ing") && !w.ends_with("ed"))
        .take(limit)
        .collect()
}

/// Uppercase the first character, lowercase the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Check if a word is a stop word.
fn is_stop_word(word: &str) -> bool {
    const STOP_WORDS: &[&str] = &[
        "about", "above", "after", "again", "against", "because", "before", "being", "below",
        "between", "could", "doing", "during", "every", "their", "there", "these", "those",
        "through", "under", "until", "where", "which", "while", "would", "should", "shall",
        "might", "other", "itself", "myself", "yourself", "themselves", "released", "announced",
        "introduced", "discovered", "continues",
    ];

    STOP_WORDS.contains(&word)
}
