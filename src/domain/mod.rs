//! Domain layer types and invariants.

pub mod email_templates;
pub mod error;
