//! # gapwise-config
//!
//! TOML configuration for gapwise batch runs.
//!
//! `PipelineConfig` is loaded with `from_toml_str` or `from_file` and
//! validated on load, so a config that loads is safe to run with.
//!
//! ```rust,ignore
//! use gapwise_config::PipelineConfig;
//!
//! let config = PipelineConfig::from_file(Path::new("gapwise.toml"))?;
//! let guarded = GuardedOracle::new(oracle, config.retry_policy());
//! ```

pub mod sections;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use gapwise_contracts::error::{GapwiseError, GapwiseResult};
use gapwise_core::RetryPolicy;

pub use sections::{BatchSection, EvidenceSection, IntakeSection, OracleSection, PipelineSection};

/// The full configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    pub oracle: OracleSection,
    pub batch: BatchSection,
    pub evidence: EvidenceSection,
    pub intake: IntakeSection,
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    ///
    /// Returns `GapwiseError::ConfigError` if the TOML is malformed, has
    /// unknown keys, or fails `validate`.
    pub fn from_toml_str(s: &str) -> GapwiseResult<Self> {
        let config: PipelineConfig = toml::from_str(s).map_err(|e| GapwiseError::ConfigError {
            reason: format!("failed to parse pipeline TOML: {}", e),
        })?;
        config.validate()?;
        debug!(
            max_concurrency = config.batch.max_concurrency,
            materiality_check = config.pipeline.materiality_check,
            "pipeline configuration loaded"
        );
        Ok(config)
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> GapwiseResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GapwiseError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check value ranges. Reports every problem at once.
    pub fn validate(&self) -> GapwiseResult<()> {
        let mut problems = Vec::new();

        if self.batch.max_concurrency < 1 {
            problems.push("batch.max_concurrency must be at least 1".to_string());
        }
        if self.oracle.max_attempts < 1 {
            problems.push("oracle.max_attempts must be at least 1".to_string());
        }
        if self.oracle.timeout_ms == 0 {
            problems.push("oracle.timeout_ms must be greater than 0".to_string());
        }
        if self.evidence.top_k < 1 {
            problems.push("evidence.top_k must be at least 1".to_string());
        }
        let threshold = self.intake.auto_approve_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            problems.push(format!(
                "intake.auto_approve_threshold must lie in [0, 1], got {}",
                threshold
            ));
        }
        if self.pipeline.scope.trim().is_empty() {
            problems.push("pipeline.scope must not be blank".to_string());
        }
        if self.pipeline.theme.trim().is_empty() {
            problems.push("pipeline.theme must not be blank".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(GapwiseError::ConfigError {
                reason: problems.join("; "),
            })
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.oracle.timeout_ms),
            max_attempts: self.oracle.max_attempts,
            backoff: Duration::from_millis(self.oracle.backoff_ms),
        }
    }

    /// Render as TOML, e.g. to show the effective configuration.
    pub fn to_toml_string(&self) -> GapwiseResult<String> {
        toml::to_string_pretty(self).map_err(|e| GapwiseError::ConfigError {
            reason: format!("failed to render pipeline TOML: {}", e),
        })
    }
}
