//! # gapwise-stages
//!
//! The four canonical stages of a compliance review:
//!
//! | stage               | oracle task       | writes                 | runs on                    |
//! |---------------------|-------------------|------------------------|----------------------------|
//! | `Inspector`         | `gap-routing`     | route, confidence      | every case                 |
//! | `Auditor`           | `gap-finding`     | gap finding            | `KEEP_GAP`                 |
//! | `RiskAssessor`      | `risk-assessment` | risk assessment        | `KEEP_GAP`, `NO_GAP_HIGH_RISK` |
//! | `MaterialityCheck`  | none              | materiality route      | after the risk assessor    |
//!
//! Every oracle reply is verified against its schema in [`schemas`] before a
//! single field is read.

pub mod auditor;
pub mod decode;
pub mod inspector;
pub mod materiality;
pub mod risk;
pub mod schemas;

use std::sync::Arc;

use gapwise_core::{
    traits::{Stage, Verifier},
    GuardedOracle,
};

pub use auditor::Auditor;
pub use inspector::Inspector;
pub use materiality::MaterialityCheck;
pub use risk::RiskAssessor;

/// The stage set for `StageGraph::canonical(materiality)`.
pub fn canonical_stages(
    oracle: GuardedOracle,
    verifier: Arc<dyn Verifier>,
    materiality: bool,
) -> Vec<Arc<dyn Stage>> {
    let mut stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(Inspector::new(oracle.clone(), verifier.clone())),
        Arc::new(Auditor::new(oracle.clone(), verifier.clone())),
        Arc::new(RiskAssessor::new(oracle, verifier)),
    ];
    if materiality {
        stages.push(Arc::new(MaterialityCheck));
    }
    stages
}
