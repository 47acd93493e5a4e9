//! Batch input: one requirement per case.

use serde::{Deserialize, Serialize};
use tracing::warn;

use gapwise_contracts::case::PriorAssessment;

/// A requirement admitted to a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub text: String,
    /// Falls back to the configured theme when `None`.
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub prior: Option<PriorAssessment>,
}

impl Requirement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            theme: None,
            prior: None,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_prior(mut self, prior: PriorAssessment) -> Self {
        self.prior = Some(prior);
        self
    }
}

/// Parse a requirements listing: one requirement per line, optionally
/// prefixed with `theme |`. Blank lines and `#` comments are skipped. A line
/// with a theme but no text is skipped with a warning naming its line number.
///
/// ```text
/// # access control
/// Access Control | MFA is required for all remote access
/// Backups must be restore-tested quarterly
/// ```
pub fn parse_requirements(listing: &str) -> Vec<Requirement> {
    let (requirements, dropped) = split_listing(listing);
    for line in dropped {
        warn!(line, "requirement line has a theme but no text, skipped");
    }
    requirements
}

/// Requirements plus the 1-based numbers of lines dropped for missing text.
fn split_listing(listing: &str) -> (Vec<Requirement>, Vec<usize>) {
    let mut requirements = Vec::new();
    let mut dropped = Vec::new();
    for (number, line) in listing.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('|') {
            Some((theme, text)) => {
                let (theme, text) = (theme.trim(), text.trim());
                if text.is_empty() {
                    dropped.push(number + 1);
                    continue;
                }
                let requirement = Requirement::new(text);
                requirements.push(if theme.is_empty() {
                    requirement
                } else {
                    requirement.with_theme(theme)
                });
            }
            None => requirements.push(Requirement::new(line)),
        }
    }
    (requirements, dropped)
}
