use crate::DataType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Closed set of step kinds a workflow node can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "START")]
    Start,
    #[serde(rename = "END")]
    End,
    #[serde(rename = "CONDITION")]
    Condition,
    #[serde(rename = "VARVALUE")]
    VarValue,
    #[serde(rename = "DATATYPECONVERT")]
    DataTypeConvert,
    #[serde(rename = "CALLFLOW")]
    CallFlow,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "JsonToJson")]
    JsonToJson,
    #[serde(rename = "HTTP_REQUEST")]
    HttpRequest,
    #[serde(rename = "DATABASE")]
    Database,
    #[serde(rename = "LOOP")]
    Loop,
    #[serde(rename = "PARALLEL")]
    Parallel,
}

impl NodeKind {
    pub const ALL: [NodeKind; 12] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::Condition,
        NodeKind::VarValue,
        NodeKind::DataTypeConvert,
        NodeKind::CallFlow,
        NodeKind::Error,
        NodeKind::JsonToJson,
        NodeKind::HttpRequest,
        NodeKind::Database,
        NodeKind::Loop,
        NodeKind::Parallel,
    ];

    /// Wire name, shared by the internal format and the legacy `TypeCode`.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Start => "START",
            NodeKind::End => "END",
            NodeKind::Condition => "CONDITION",
            NodeKind::VarValue => "VARVALUE",
            NodeKind::DataTypeConvert => "DATATYPECONVERT",
            NodeKind::CallFlow => "CALLFLOW",
            NodeKind::Error => "ERROR",
            NodeKind::JsonToJson => "JsonToJson",
            NodeKind::HttpRequest => "HTTP_REQUEST",
            NodeKind::Database => "DATABASE",
            NodeKind::Loop => "LOOP",
            NodeKind::Parallel => "PARALLEL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Kinds whose linear successor lives in `nextId`.
    pub fn has_single_successor(self) -> bool {
        !matches!(self, NodeKind::Condition | NodeKind::End | NodeKind::Parallel)
    }

    pub fn default_name(self) -> &'static str {
        match self {
            NodeKind::Start => "开始",
            NodeKind::End => "结束",
            NodeKind::Condition => "条件判断",
            NodeKind::VarValue => "变量赋值",
            NodeKind::DataTypeConvert => "类型转换",
            NodeKind::CallFlow => "调用流程",
            NodeKind::Error => "异常处理",
            NodeKind::JsonToJson => "JSON转换",
            NodeKind::HttpRequest => "HTTP请求",
            NodeKind::Database => "数据库操作",
            NodeKind::Loop => "循环",
            NodeKind::Parallel => "并行处理",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            NodeKind::Start => "工作流开始节点",
            NodeKind::End => "工作流结束节点",
            NodeKind::Condition => "根据条件选择执行路径",
            NodeKind::VarValue => "为变量赋值",
            NodeKind::DataTypeConvert => "转换数据类型",
            NodeKind::CallFlow => "调用其他工作流",
            NodeKind::Error => "处理异常情况",
            NodeKind::JsonToJson => "JSON数据转换",
            NodeKind::HttpRequest => "发送HTTP请求",
            NodeKind::Database => "执行数据库操作",
            NodeKind::Loop => "循环执行操作",
            NodeKind::Parallel => "并行执行多个分支",
        }
    }

    pub fn default_color(self) -> &'static str {
        match self {
            NodeKind::Start => "rgba(34, 197, 94, 1)",
            NodeKind::End => "rgba(239, 68, 68, 1)",
            NodeKind::Condition => "rgba(251, 191, 36, 1)",
            NodeKind::VarValue => "rgba(59, 130, 246, 1)",
            NodeKind::DataTypeConvert => "rgba(168, 85, 247, 1)",
            NodeKind::CallFlow => "rgba(236, 72, 153, 1)",
            NodeKind::Error => "rgba(239, 68, 68, 1)",
            NodeKind::JsonToJson => "rgba(14, 165, 233, 1)",
            NodeKind::HttpRequest => "rgba(34, 197, 94, 1)",
            NodeKind::Database => "rgba(156, 163, 175, 1)",
            NodeKind::Loop => "rgba(251, 146, 60, 1)",
            NodeKind::Parallel => "rgba(139, 92, 246, 1)",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind node payload.
///
/// Serialized adjacently as `{"type": ..., "data": {...}}` so it can be
/// flattened straight into the node object. On input only `type` is
/// required: a missing or ill-shaped `data` reads as an unconfigured payload
/// of that kind, leaving the validator to report what is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum NodeData {
    #[serde(rename = "START")]
    Start(Value),
    #[serde(rename = "END")]
    End(Value),
    #[serde(rename = "CONDITION")]
    Condition(ConditionData),
    #[serde(rename = "VARVALUE")]
    VarValue(VarValueData),
    #[serde(rename = "DATATYPECONVERT")]
    DataTypeConvert(DataTypeConvertData),
    #[serde(rename = "CALLFLOW")]
    CallFlow(CallFlowData),
    #[serde(rename = "ERROR")]
    Error(Value),
    #[serde(rename = "JsonToJson")]
    JsonToJson(Value),
    #[serde(rename = "HTTP_REQUEST")]
    HttpRequest(HttpRequestData),
    #[serde(rename = "DATABASE")]
    Database(DatabaseData),
    #[serde(rename = "LOOP")]
    Loop(Value),
    #[serde(rename = "PARALLEL")]
    Parallel(Value),
}

impl NodeData {
    /// Palette defaults for a freshly placed node.
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Start => NodeData::Start(empty_object()),
            NodeKind::End => NodeData::End(empty_object()),
            NodeKind::Condition => NodeData::Condition(ConditionData::default()),
            NodeKind::VarValue => NodeData::VarValue(VarValueData {
                assignments: Some(Vec::new()),
            }),
            NodeKind::DataTypeConvert => NodeData::DataTypeConvert(DataTypeConvertData::default()),
            NodeKind::CallFlow => NodeData::CallFlow(CallFlowData::default()),
            NodeKind::Error => NodeData::Error(empty_object()),
            NodeKind::JsonToJson => NodeData::JsonToJson(empty_object()),
            NodeKind::HttpRequest => NodeData::HttpRequest(HttpRequestData {
                method: "GET".to_string(),
                ..HttpRequestData::default()
            }),
            NodeKind::Database => NodeData::Database(DatabaseData::default()),
            NodeKind::Loop => NodeData::Loop(json!({ "condition": "", "maxIterations": 100 })),
            NodeKind::Parallel => NodeData::Parallel(json!({ "branches": [] })),
        }
    }

    /// Wraps an untyped payload for the kinds that carry one.
    ///
    /// Returns `None` for kinds with a typed payload.
    pub fn raw(kind: NodeKind, value: Value) -> Option<Self> {
        match kind {
            NodeKind::Start => Some(NodeData::Start(value)),
            NodeKind::End => Some(NodeData::End(value)),
            NodeKind::Error => Some(NodeData::Error(value)),
            NodeKind::JsonToJson => Some(NodeData::JsonToJson(value)),
            NodeKind::Loop => Some(NodeData::Loop(value)),
            NodeKind::Parallel => Some(NodeData::Parallel(value)),
            _ => None,
        }
    }

    /// Reads `data` for `kind`, falling back to an unconfigured payload.
    pub fn from_value(kind: NodeKind, data: Value) -> Self {
        if data.is_null() {
            return unconfigured(kind);
        }

        let parsed = match kind {
            NodeKind::Condition => serde_json::from_value(data).map(NodeData::Condition),
            NodeKind::VarValue => serde_json::from_value(data).map(NodeData::VarValue),
            NodeKind::DataTypeConvert => {
                serde_json::from_value(data).map(NodeData::DataTypeConvert)
            }
            NodeKind::CallFlow => serde_json::from_value(data).map(NodeData::CallFlow),
            NodeKind::HttpRequest => serde_json::from_value(data).map(NodeData::HttpRequest),
            NodeKind::Database => serde_json::from_value(data).map(NodeData::Database),
            raw_kind => {
                return NodeData::raw(raw_kind, data).unwrap_or_else(|| unconfigured(raw_kind))
            }
        };

        parsed.unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed {} node data: {}", kind, e);
            unconfigured(kind)
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Start(_) => NodeKind::Start,
            NodeData::End(_) => NodeKind::End,
            NodeData::Condition(_) => NodeKind::Condition,
            NodeData::VarValue(_) => NodeKind::VarValue,
            NodeData::DataTypeConvert(_) => NodeKind::DataTypeConvert,
            NodeData::CallFlow(_) => NodeKind::CallFlow,
            NodeData::Error(_) => NodeKind::Error,
            NodeData::JsonToJson(_) => NodeKind::JsonToJson,
            NodeData::HttpRequest(_) => NodeKind::HttpRequest,
            NodeData::Database(_) => NodeKind::Database,
            NodeData::Loop(_) => NodeKind::Loop,
            NodeData::Parallel(_) => NodeKind::Parallel,
        }
    }
}

impl<'de> Deserialize<'de> for NodeData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: NodeKind,
            #[serde(default)]
            data: Value,
        }

        let Tagged { kind, data } = Tagged::deserialize(deserializer)?;
        Ok(NodeData::from_value(kind, data))
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Payload for a node whose `data` is absent. Unlike the palette defaults,
/// typed kinds come back empty so nothing looks configured.
fn unconfigured(kind: NodeKind) -> NodeData {
    match kind {
        NodeKind::Condition => NodeData::Condition(ConditionData::default()),
        NodeKind::VarValue => NodeData::VarValue(VarValueData::default()),
        NodeKind::DataTypeConvert => NodeData::DataTypeConvert(DataTypeConvertData::default()),
        NodeKind::CallFlow => NodeData::CallFlow(CallFlowData::default()),
        NodeKind::HttpRequest => NodeData::HttpRequest(HttpRequestData::default()),
        NodeKind::Database => NodeData::Database(DatabaseData::default()),
        raw_kind => NodeData::default_for(raw_kind),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionData {
    pub expression: String,
    pub true_node_id: String,
    pub false_node_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarValueData {
    /// `None` when the node was never configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<Assignment>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Assignment {
    pub variable_id: String,
    pub expression_id: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataTypeConvertData {
    pub source_variable_id: String,
    pub target_variable_id: String,
    pub source_type: DataType,
    pub target_type: DataType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallFlowData {
    pub flow_id: String,
    pub flow_name: String,
    pub variable_mapping: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpRequestData {
    pub url: String,
    /// Empty means unspecified; executors fall back to GET.
    pub method: String,
    pub headers: Map<String, Value>,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseData {
    pub connection_id: String,
    pub query: String,
    pub parameters: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_bijective() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(NodeKind::from_name("JSONTOJSON"), None);
        assert_eq!(NodeKind::from_name("start"), None);
    }

    #[test]
    fn default_data_matches_kind() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeData::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn data_serializes_adjacently() {
        let data = NodeData::Condition(ConditionData {
            expression: "exp".into(),
            true_node_id: "a".into(),
            false_node_id: "b".into(),
        });
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "CONDITION");
        assert_eq!(json["data"]["trueNodeId"], "a");

        let back: NodeData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn typed_payloads_tolerate_missing_fields() {
        let data: NodeData = serde_json::from_value(json!({
            "type": "HTTP_REQUEST",
            "data": { "url": "https://example.com" }
        }))
        .unwrap();
        match data {
            NodeData::HttpRequest(http) => {
                assert_eq!(http.url, "https://example.com");
                assert_eq!(http.method, "");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn missing_data_reads_as_unconfigured() {
        let data: NodeData = serde_json::from_value(json!({ "type": "VARVALUE" })).unwrap();
        assert_eq!(data, NodeData::VarValue(VarValueData { assignments: None }));

        let data: NodeData = serde_json::from_value(json!({ "type": "LOOP", "data": null })).unwrap();
        assert_eq!(data, NodeData::default_for(NodeKind::Loop));
    }

    #[test]
    fn malformed_data_keeps_the_kind() {
        let data: NodeData = serde_json::from_value(json!({
            "type": "CONDITION",
            "data": "not an object"
        }))
        .unwrap();
        assert_eq!(data, NodeData::Condition(ConditionData::default()));

        let data: NodeData = serde_json::from_value(json!({
            "type": "VARVALUE",
            "data": { "assignments": "nope" }
        }))
        .unwrap();
        assert_eq!(data.kind(), NodeKind::VarValue);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_value::<NodeData>(json!({ "type": "SCRIPT", "data": {} })).is_err());
    }
}
