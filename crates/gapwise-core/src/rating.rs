//! Deterministic risk rating and materiality rules.
//!
//! The oracle proposes a rating, but the stored rating is always the value
//! from this table so that identical (impact, likelihood) pairs rate the same
//! way on every run.
//!
//! | impact \ likelihood | Low    | Medium | High     |
//! |---------------------|--------|--------|----------|
//! | Low                 | Low    | Low    | Medium   |
//! | Medium              | Low    | Medium | High     |
//! | High                | Medium | High   | Critical |
//!
//! A Low on one axis caps the rating at Low, except against a High on the
//! other axis, which is pinned to Medium.

use gapwise_contracts::route::{Level, Rating, RiskRoute};

/// Rate a risk from its impact and likelihood. Symmetric and total.
pub fn rate(impact: Level, likelihood: Level) -> Rating {
    use Level::{High, Low, Medium};

    match (impact, likelihood) {
        (High, High) => Rating::Critical,
        (High, Medium) | (Medium, High) => Rating::High,
        (Medium, Medium) => Rating::Medium,
        (Low, High) | (High, Low) => Rating::Medium,
        (Low, Low) | (Low, Medium) | (Medium, Low) => Rating::Low,
    }
}

/// Materiality rule: anything rated Medium or above is reported.
pub fn materiality(rating: Rating) -> RiskRoute {
    match rating {
        Rating::Medium | Rating::High | Rating::Critical => RiskRoute::KeepRisk,
        Rating::Low => RiskRoute::DropRisk,
    }
}
