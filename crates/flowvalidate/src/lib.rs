//! Structural validation for workflow documents
//!
//! Validation never fails: findings are returned as data, split into
//! errors (the document is unusable) and warnings (advisory only).

mod result;
mod validator;

pub use result::{Severity, ValidationIssue, ValidationResult};
pub use validator::{validate_workflow, WorkflowValidator};
