//! Evidence passages returned by an evidence source.

use serde::{Deserialize, Serialize};

/// One ranked passage of supporting text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Where the passage came from (document name, section, chunk id).
    pub source: String,
    /// Relevance score. Higher is more relevant; scale is source-defined.
    pub score: f64,
}

/// Render passages, best first, into the evidence text a case carries.
///
/// Blank passages are skipped. Each passage is prefixed with its source so
/// the Auditor can cite it.
pub fn render_evidence(passages: &[Passage]) -> String {
    passages
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| format!("[{}] {}", p.source, p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_skips_blank_passages_and_keeps_order() {
        let passages = vec![
            Passage { text: "Incidents are reported to the CISO.".into(), source: "ir-policy#2".into(), score: 0.9 },
            Passage { text: "   ".into(), source: "empty".into(), score: 0.5 },
            Passage { text: "Backups run nightly.".into(), source: "bcp#1".into(), score: 0.2 },
        ];
        let rendered = render_evidence(&passages);
        assert_eq!(
            rendered,
            "[ir-policy#2] Incidents are reported to the CISO.\n\n[bcp#1] Backups run nightly."
        );
    }

    #[test]
    fn render_of_nothing_is_empty() {
        assert_eq!(render_evidence(&[]), "");
    }
}
