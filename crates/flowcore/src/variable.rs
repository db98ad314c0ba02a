use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Value types a workflow variable can hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    Json,
    Array,
    Date,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Number => "NUMBER",
            DataType::Boolean => "BOOLEAN",
            DataType::Json => "JSON",
            DataType::Array => "ARRAY",
            DataType::Date => "DATE",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeCycle {
    #[default]
    Single,
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowVariable {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `None` only for hand-written documents; the validator reports it.
    #[serde(default)]
    pub data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub life_cycle: LifeCycle,
    /// Field tree for JSON-typed variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_nodes: Vec<JsonNode>,
}

impl WorkflowVariable {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_type: Some(data_type),
            default_value: None,
            description: None,
            life_cycle: LifeCycle::Single,
            json_nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonNodeType {
    #[default]
    Node,
    Array,
}

/// One field in the schema of a JSON-typed variable.
///
/// Accepts both camelCase and the PascalCase spelling used by legacy
/// documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonNode {
    #[serde(alias = "Id", alias = "ID")]
    pub id: String,
    #[serde(default, alias = "ParentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "DataType")]
    pub data_type: String,
    #[serde(default, alias = "NodeType")]
    pub node_type: JsonNodeType,
    #[serde(default, alias = "Children", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<JsonNode>,
}
