//! # gapwise-contracts
//!
//! Shared types, schemas, and contracts for the gapwise compliance workflow.
//!
//! Every crate in the workspace imports from here. No workflow logic lives in
//! this crate beyond the field-ownership checks on `Case`.

pub mod case;
pub mod error;
pub mod evidence;
pub mod oracle;
pub mod record;
pub mod route;
pub mod verify;
