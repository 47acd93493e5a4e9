//! # gapwise-verify
//!
//! Oracle reply verification for gapwise stages.
//!
//! This crate provides [`engine::SchemaVerifier`], which implements the
//! [`gapwise_core::traits::Verifier`] trait. It validates `OracleReply`
//! payloads in two phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate.
//! 2. **Semantic**: rules (`RequiredField`, `AllowedValues`, `NumberRange`,
//!    `MaxLength`, `ForbiddenPattern`, `Custom`) evaluated against the payload.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use gapwise_verify::engine::SchemaVerifier;
//!
//! let mut verifier = SchemaVerifier::new();
//! verifier.register_rule("risk-statement-format", Box::new(|payload| {
//!     let statement = payload.get("risk_statement")?.as_str()?;
//!     (!statement.starts_with("If ")).then(|| "must start with 'If '".to_string())
//! }));
//! ```

pub mod engine;

pub use engine::SchemaVerifier;
