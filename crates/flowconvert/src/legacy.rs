//! Records of the legacy interchange dialect.
//!
//! The dialect keys every entity by an opaque hex id inside three
//! dictionaries and spells fields in PascalCase. Dictionary entries are read
//! one at a time: an entry that does not fit its record shape is dropped with
//! a warning and the rest of the document still loads.

use flowcore::{DataType, JsonNode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Legacy numeric data-type codes.
const DATA_TYPE_CODES: [(i64, DataType); 6] = [
    (1, DataType::Number),
    (2, DataType::String),
    (3, DataType::Boolean),
    (4, DataType::Array),
    (5, DataType::Date),
    (33, DataType::Json),
];

/// `LifeCycle` value the legacy dialect uses for persistent variables.
pub const PERSISTENT_LIFE_CYCLE: &str = "持久";
/// `LifeCycle` value written for single-run variables.
pub const SINGLE_LIFE_CYCLE: &str = "单次";

/// Resolves a legacy data-type code, given as a number or a numeric string.
pub fn data_type_from_code(code: &Value) -> Option<DataType> {
    let code = match code {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DATA_TYPE_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, data_type)| *data_type)
}

pub fn data_type_code(data_type: DataType) -> i64 {
    DATA_TYPE_CODES
        .iter()
        .find(|(_, dt)| *dt == data_type)
        .map(|(code, _)| *code)
        .unwrap_or(2)
}

/// Top-level legacy document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyWorkflow {
    #[serde(
        rename = "ID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(rename = "StartID", default, deserialize_with = "lenient_text")]
    pub start_id: Option<String>,
    #[serde(
        rename = "ErrorID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub flow_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub max_parallel: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub max_queue_length: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub execution_timeout_second: Option<u32>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub process_dic: BTreeMap<String, LegacyNode>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub variable_dic: BTreeMap<String, LegacyVariable>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub expression_dic: BTreeMap<String, LegacyExpression>,
}

/// One `ProcessDic` entry.
///
/// Common fields come first; the rest are only meaningful for the node kind
/// named by `TypeCode`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyNode {
    #[serde(
        rename = "ID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "NextID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_id: Option<String>,
    #[serde(
        rename = "PreviousID",
        default,
        deserialize_with = "lenient_ids",
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_id: Option<Vec<String>>,
    #[serde(
        rename = "ErrorID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub type_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    // CONDITION
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(
        rename = "TrueID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub true_id: Option<String>,
    #[serde(
        rename = "FalseID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub false_id: Option<String>,

    // VARVALUE
    #[serde(
        rename = "VarIDAndExpID",
        default,
        deserialize_with = "lenient_id_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub var_id_and_exp_id: Option<BTreeMap<String, String>>,

    // DATATYPECONVERT
    #[serde(
        rename = "SourceVarID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_var_id: Option<String>,
    #[serde(
        rename = "OutVarID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub out_var_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_data_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_data_type: Option<Value>,

    // CALLFLOW
    #[serde(
        rename = "FlowID",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub flow_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub flow_name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub flow_var_contrast: Option<Map<String, Value>>,

    // HTTP_REQUEST
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    // DATABASE
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Value>>,

    /// Raw payload for kinds without a dedicated mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One `VariableDic` entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyVariable {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Some producers also write a lowercase `name`.
    #[serde(
        rename = "name",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub life_cycle: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub json_nodes: Option<Vec<JsonNode>>,
}

/// One `ExpressionDic` entry.
///
/// `Content` is either a bare string or an array mixing text fragments with
/// `{Id, Text}` variable references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyExpression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

fn lenient_entries<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries,
        Value::Null => return Ok(BTreeMap::new()),
        other => {
            tracing::warn!("Ignoring dictionary that is not an object: {}", other);
            return Ok(BTreeMap::new());
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|(id, value)| match serde_json::from_value(value) {
            Ok(entry) => Some((id, entry)),
            Err(e) => {
                tracing::warn!("Dropping malformed legacy entry {}: {}", id, e);
                None
            }
        })
        .collect())
}

/// Text form of a scalar; `None` for null, arrays and objects.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let text = scalar_text(&value);
    if text.is_none() && !value.is_null() {
        tracing::warn!("Ignoring non-text legacy field: {}", value);
    }
    Ok(text)
}

/// Counts given as numbers or numeric strings. Negative, fractional and
/// non-numeric values read as absent so the caller's default applies.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .and_then(|n| u32::try_from(n).ok());

    if count.is_none() && !value.is_null() {
        tracing::warn!("Ignoring malformed legacy count: {}", value);
    }
    Ok(count)
}

/// `PreviousID` as a list of ids. A lone id string is accepted and
/// non-scalar items are skipped.
fn lenient_ids<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().filter_map(scalar_text).collect()),
        Value::String(id) if id.is_empty() => Some(Vec::new()),
        Value::String(id) => Some(vec![id]),
        other => {
            tracing::warn!("Ignoring malformed id list: {}", other);
            None
        }
    })
}

/// `VarIDAndExpID` as variable id → expression id. Entries whose value is
/// not a scalar are skipped.
fn lenient_id_map<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Object(entries) => Some(
            entries
                .iter()
                .filter_map(|(variable_id, expression_id)| {
                    scalar_text(expression_id).map(|id| (variable_id.clone(), id))
                })
                .collect(),
        ),
        other => {
            tracing::warn!("Ignoring malformed id map: {}", other);
            None
        }
    })
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            tracing::warn!("Ignoring malformed legacy field: {}", e);
            Ok(None)
        }
    }
}
