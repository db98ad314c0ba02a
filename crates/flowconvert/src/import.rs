use crate::convert::from_legacy;
use crate::legacy::LegacyWorkflow;
use chrono::Utc;
use flowcore::{FlowError, ImportError, Workflow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Version stamped on export wrappers.
pub const EXPORT_VERSION: &str = "1.0.0";

/// Shape of an import document, decided by inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// Has both `ProcessDic` and `FlowName`.
    Legacy,
    /// Has a top-level `workflow` key.
    Export,
    /// Anything else that is a JSON object.
    Internal,
}

impl ImportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportFormat::Legacy => "legacy",
            ImportFormat::Export => "export",
            ImportFormat::Internal => "internal",
        }
    }
}

/// Export wrapper written by the editor's save action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub workflow: Workflow,
    pub version: String,
    pub export_date: String,
}

impl ExportDocument {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub fn detect_format(value: &Value) -> Result<ImportFormat, ImportError> {
    let Value::Object(fields) = value else {
        return Err(ImportError::UnrecognizedShape(format!(
            "expected a JSON object, found {}",
            json_kind(value)
        )));
    };

    let present = |key: &str| fields.get(key).is_some_and(|v| !v.is_null());
    if present("ProcessDic") && present("FlowName") {
        Ok(ImportFormat::Legacy)
    } else if present("workflow") {
        Ok(ImportFormat::Export)
    } else {
        Ok(ImportFormat::Internal)
    }
}

/// Parses import text and loads it as a workflow.
pub fn import_str(input: &str) -> Result<Workflow, ImportError> {
    let value: Value = serde_json::from_str(input).map_err(ImportError::Parse)?;
    import_value(value)
}

/// Loads an already parsed document in any of the three accepted shapes.
pub fn import_value(value: Value) -> Result<Workflow, ImportError> {
    let format = detect_format(&value)?;
    tracing::debug!("Detected {} import document", format.as_str());

    let workflow = match format {
        ImportFormat::Legacy => {
            let legacy: LegacyWorkflow =
                serde_json::from_value(value).map_err(|source| ImportError::InvalidDocument {
                    format: ImportFormat::Legacy.as_str(),
                    source,
                })?;
            from_legacy(&legacy)
        }
        ImportFormat::Export => {
            let document: ExportDocument = serde_json::from_value(value).map_err(|source| {
                ImportError::InvalidDocument {
                    format: ImportFormat::Export.as_str(),
                    source,
                }
            })?;
            document.workflow
        }
        ImportFormat::Internal => {
            serde_json::from_value(value).map_err(|source| ImportError::InvalidDocument {
                format: ImportFormat::Internal.as_str(),
                source,
            })?
        }
    };

    tracing::info!(
        "Imported workflow {} ({}) from {} document",
        workflow.id,
        workflow.name,
        format.as_str()
    );
    Ok(workflow)
}

/// Reads and imports a document from disk.
pub fn import_file(path: impl AsRef<Path>) -> flowcore::Result<Workflow> {
    let text = std::fs::read_to_string(path)?;
    Ok(import_str(&text)?)
}

/// Writes any document as pretty-printed JSON.
pub fn write_document<T: Serialize>(path: impl AsRef<Path>, document: &T) -> flowcore::Result<()> {
    let json = serde_json::to_string_pretty(document).map_err(FlowError::Serialization)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
