//! Legacy dialect support
//!
//! Converts between the PascalCase legacy interchange format and the
//! internal [`Workflow`](flowcore::Workflow) document, and decides which of
//! the accepted import shapes a JSON document has.
//!
//! Legacy → internal synthesizes positions (hashed from node ids) and edges
//! (from node pointers). Internal → legacy drops positions, edges and any
//! payload without a legacy field mapping.

mod convert;
mod demo;
mod edges;
mod import;
mod layout;
mod legacy;

pub use convert::{from_legacy, to_legacy, UNNAMED_WORKFLOW};
pub use demo::{demo_workflow, DEMO_LEGACY_JSON};
pub use edges::{synthesize_edges, ERROR_LABEL, FALSE_LABEL, TRUE_LABEL};
pub use import::{
    detect_format, import_file, import_str, import_value, write_document, ExportDocument,
    ImportFormat, EXPORT_VERSION,
};
pub use layout::position_for;
pub use legacy::{
    data_type_code, data_type_from_code, LegacyExpression, LegacyNode, LegacyVariable,
    LegacyWorkflow, PERSISTENT_LIFE_CYCLE, SINGLE_LIFE_CYCLE,
};

/// Parses a legacy document and converts it.
pub fn from_legacy_str(input: &str) -> Result<flowcore::Workflow, flowcore::ImportError> {
    let legacy: LegacyWorkflow =
        serde_json::from_str(input).map_err(flowcore::ImportError::Parse)?;
    Ok(from_legacy(&legacy))
}
