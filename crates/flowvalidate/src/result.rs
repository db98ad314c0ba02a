use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding.
///
/// `node_id` is absent for workflow-, edge-, variable- and expression-level
/// findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.node_id {
            Some(node_id) => write!(f, "{} [{}]: {}", label, node_id, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True iff `errors` is empty.
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub(crate) fn new(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// One-line verdict for status bars and CLI output.
    pub fn summary(&self) -> String {
        if !self.is_valid {
            format!(
                "Validation failed with {} error(s) and {} warning(s)",
                self.errors.len(),
                self.warnings.len()
            )
        } else if self.warnings.is_empty() {
            "Validation passed with no issues".to_string()
        } else {
            format!(
                "Validation passed with {} warning(s)",
                self.warnings.len()
            )
        }
    }

    /// Errors followed by warnings.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(self.warnings.iter())
    }

    pub fn issues_for_node<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues()
            .filter(move |issue| issue.node_id.as_deref() == Some(node_id))
    }
}
