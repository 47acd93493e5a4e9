//! Keyword extraction shared by the heuristic oracle and the evidence index.

use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "between", "both", "each", "from", "have",
    "into", "least", "more", "most", "must", "only", "other", "over", "shall", "should", "such",
    "than", "that", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "under", "until", "upon", "when", "where", "which", "while", "will", "with", "within", "without",
];

/// Lowercased words of four or more characters, minus common filler.
pub fn key_terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}

/// Fraction of `terms` that also occur in `text`. Zero when `terms` is empty.
pub fn coverage(terms: &BTreeSet<String>, text: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let present = key_terms(text);
    let hits = terms.iter().filter(|term| present.contains(*term)).count();
    hits as f64 / terms.len() as f64
}

/// True if `text` mentions any of `markers` (case-insensitive substring).
pub fn mentions_any(text: &str, markers: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    markers.iter().any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_words_and_stopwords_are_dropped() {
        let terms = key_terms("Access MUST be reviewed at least quarterly, with MFA.");
        let terms: Vec<&str> = terms.iter().map(String::as_str).collect();
        assert_eq!(terms, vec!["access", "quarterly", "reviewed"]);
    }

    #[test]
    fn coverage_counts_distinct_terms() {
        let terms = key_terms("backups restore tested quarterly");
        assert_eq!(coverage(&terms, "Backups are restore tested."), 0.75);
        assert_eq!(coverage(&terms, ""), 0.0);
        assert_eq!(coverage(&key_terms(""), "anything"), 0.0);
    }

    #[test]
    fn markers_match_case_insensitively() {
        assert!(mentions_any("Privileged ACCESS", &["privileged"]));
        assert!(!mentions_any("ordinary", &["privileged"]));
    }
}
