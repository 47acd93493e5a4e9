//! A keyword-overlap evidence index over a small policy corpus.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use gapwise_contracts::{
    error::{GapwiseError, GapwiseResult},
    evidence::Passage,
};
use gapwise_core::traits::EvidenceSource;

use crate::terms::{coverage, key_terms};

/// The bundled internal policy corpus.
pub const BUNDLED_POLICIES: &str = include_str!("../data/policies.md");

struct Entry {
    source: String,
    text: String,
}

/// Ranks passages by the share of query terms they contain.
///
/// The corpus is fixed at construction. `set_available(false)` simulates an
/// outage: every retrieval fails until it is switched back on.
pub struct KeywordIndex {
    entries: Vec<Entry>,
    available: AtomicBool,
}

impl KeywordIndex {
    /// Build from `(source, passage)` pairs. Blank passages are ignored.
    pub fn new<S, T>(passages: impl IntoIterator<Item = (S, T)>) -> Self
    where
        S: Into<String>,
        T: Into<String>,
    {
        let entries = passages
            .into_iter()
            .map(|(source, text)| Entry {
                source: source.into(),
                text: text.into(),
            })
            .filter(|entry| !entry.text.trim().is_empty())
            .collect();
        Self {
            entries,
            available: AtomicBool::new(true),
        }
    }

    /// Parse a markdown corpus: each `## heading` names a source, and each
    /// paragraph under it is one passage. Text before the first heading is
    /// ignored.
    pub fn from_markdown(corpus: &str) -> Self {
        let mut passages: Vec<(String, String)> = Vec::new();
        let mut source: Option<String> = None;
        let mut paragraph: Vec<&str> = Vec::new();

        for line in corpus.lines().map(str::trim) {
            if let Some(heading) = line.strip_prefix("## ") {
                flush(&mut passages, source.as_deref(), &mut paragraph);
                source = Some(heading.trim().to_string());
            } else if line.is_empty() || line.starts_with('#') {
                flush(&mut passages, source.as_deref(), &mut paragraph);
            } else {
                paragraph.push(line);
            }
        }
        flush(&mut passages, source.as_deref(), &mut paragraph);

        Self::new(passages)
    }

    pub fn bundled() -> Self {
        Self::from_markdown(BUNDLED_POLICIES)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

fn flush(passages: &mut Vec<(String, String)>, source: Option<&str>, paragraph: &mut Vec<&str>) {
    if let Some(source) = source {
        if !paragraph.is_empty() {
            passages.push((source.to_string(), paragraph.join(" ")));
        }
    }
    paragraph.clear();
}

#[async_trait]
impl EvidenceSource for KeywordIndex {
    async fn retrieve(&self, query: &str, top_k: usize) -> GapwiseResult<Vec<Passage>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(GapwiseError::EvidenceUnavailable {
                reason: "keyword index is offline".to_string(),
            });
        }

        let terms = key_terms(query);
        let mut scored: Vec<Passage> = self
            .entries
            .iter()
            .map(|entry| Passage {
                text: entry.text.clone(),
                source: entry.source.clone(),
                score: coverage(&terms, &entry.text),
            })
            .filter(|passage| passage.score > 0.0)
            .collect();

        // Stable sort keeps corpus order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        debug!(query_terms = terms.len(), hits = scored.len(), "evidence retrieved");
        Ok(scored)
    }
}
