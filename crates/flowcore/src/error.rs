use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Lookup failures raised by document mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("No workflow is loaded")]
    NoDocument,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Expression not found: {0}")]
    ExpressionNotFound(String),
}

/// Hard failures while reading an import document.
///
/// Anything that parses as JSON and matches a recognised shape converts
/// best-effort instead of producing one of these.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Malformed JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Unrecognized document shape: {0}")]
    UnrecognizedShape(String),

    #[error("Invalid {format} document: {source}")]
    InvalidDocument {
        format: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
