//! Closed enumerations for routes, ratings, and stage names.
//!
//! Every branch decision in the workflow is one of these enums. Routers match
//! on them exhaustively, so adding a variant forces every consumer to handle
//! it at compile time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The triage decision produced by the Inspector stage.
///
/// Serialized in the wire form the oracle returns: `KEEP_GAP`, `DROP_GAP`,
/// `NO_GAP_HIGH_RISK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapRoute {
    /// A meaningful control gap worth reporting.
    KeepGap,
    /// Cosmetic, redundant, or out of scope. Logged without further analysis.
    DropGap,
    /// No formal gap, but contextual risk must still be assessed.
    NoGapHighRisk,
}

impl GapRoute {
    pub const ALL: [GapRoute; 3] = [GapRoute::KeepGap, GapRoute::DropGap, GapRoute::NoGapHighRisk];

    pub fn as_str(&self) -> &'static str {
        match self {
            GapRoute::KeepGap => "KEEP_GAP",
            GapRoute::DropGap => "DROP_GAP",
            GapRoute::NoGapHighRisk => "NO_GAP_HIGH_RISK",
        }
    }
}

impl fmt::Display for GapRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The materiality decision: whether a computed risk is significant enough to
/// report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRoute {
    KeepRisk,
    DropRisk,
}

impl RiskRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskRoute::KeepRisk => "KEEP_RISK",
            RiskRoute::DropRisk => "DROP_RISK",
        }
    }
}

impl fmt::Display for RiskRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-point scale used for gap severity, risk impact, and risk likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "Low",
            Level::Medium => "Medium",
            Level::High => "High",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall risk rating derived from impact and likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    Low,
    Medium,
    High,
    Critical,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Low, Rating::Medium, Rating::High, Rating::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Low => "Low",
            Rating::Medium => "Medium",
            Rating::High => "High",
            Rating::Critical => "Critical",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the workflow graph.
///
/// `Logger` is the single terminal node: reaching it hands the case to the
/// audit sink. It is not a `Stage` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    Inspector,
    Auditor,
    RiskAssessor,
    MaterialityCheck,
    Logger,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Inspector => "inspector",
            StageName::Auditor => "auditor",
            StageName::RiskAssessor => "risk-assessor",
            StageName::MaterialityCheck => "materiality-check",
            StageName::Logger => "logger",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
