use crate::edges::synthesize_edges;
use crate::layout::position_for;
use crate::legacy::{
    data_type_code, data_type_from_code, scalar_text, LegacyExpression, LegacyNode,
    LegacyVariable, LegacyWorkflow, PERSISTENT_LIFE_CYCLE, SINGLE_LIFE_CYCLE,
};
use flowcore::{
    Assignment, CallFlowData, ConditionData, DataType, DataTypeConvertData, DatabaseData,
    Expression, ExpressionSegment, HttpRequestData, LifeCycle, NodeData, NodeKind, VarValueData,
    Workflow, WorkflowNode, WorkflowVariable, DEFAULT_EXECUTION_TIMEOUT_SECOND,
    DEFAULT_MAX_PARALLEL, DEFAULT_MAX_QUEUE_LENGTH,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Name given to legacy documents that carry none.
pub const UNNAMED_WORKFLOW: &str = "未命名工作流";
const FALLBACK_COLOR: &str = "rgba(0, 0, 0, 1)";

/// Builds an internal document from a legacy one.
///
/// Never fails: nodes with an unknown `TypeCode` are dropped with a warning,
/// missing fields take defaults, and edges are synthesized from the node
/// pointers once every node is known.
pub fn from_legacy(legacy: &LegacyWorkflow) -> Workflow {
    let mut workflow = Workflow::new(
        non_empty(&legacy.flow_name).unwrap_or_else(|| UNNAMED_WORKFLOW.to_string()),
    );
    if let Some(id) = non_empty(&legacy.id) {
        workflow.id = id;
    }
    workflow.start_id = legacy.start_id.clone().unwrap_or_default();
    workflow.error_id = non_empty(&legacy.error_id);
    workflow.max_parallel = positive_or(legacy.max_parallel, DEFAULT_MAX_PARALLEL);
    workflow.max_queue_length = positive_or(legacy.max_queue_length, DEFAULT_MAX_QUEUE_LENGTH);
    workflow.execution_timeout_second = positive_or(
        legacy.execution_timeout_second,
        DEFAULT_EXECUTION_TIMEOUT_SECOND,
    );

    for (id, record) in &legacy.process_dic {
        if let Some(node) = convert_node(id, record) {
            workflow.nodes.insert(id.clone(), node);
        }
    }

    workflow.variables = legacy
        .variable_dic
        .iter()
        .map(|(id, record)| (id.clone(), convert_variable(id, record)))
        .collect();

    workflow.expressions = legacy
        .expression_dic
        .iter()
        .map(|(id, record)| (id.clone(), convert_expression(id, record)))
        .collect();

    workflow.edges = synthesize_edges(&workflow.nodes);

    tracing::info!(
        "Converted legacy workflow {} ({} nodes, {} edges, {} variables, {} expressions)",
        workflow.id,
        workflow.nodes.len(),
        workflow.edges.len(),
        workflow.variables.len(),
        workflow.expressions.len()
    );

    workflow
}

fn convert_node(id: &str, record: &LegacyNode) -> Option<WorkflowNode> {
    let type_code = record.type_code.as_deref().unwrap_or_default();
    let Some(kind) = NodeKind::from_name(type_code) else {
        tracing::warn!("Dropping node {}: unknown node type {:?}", id, type_code);
        return None;
    };

    Some(WorkflowNode {
        id: id.to_string(),
        data: convert_node_data(kind, record),
        name: non_empty(&record.name).unwrap_or_else(|| kind.as_str().to_string()),
        position: Some(position_for(id)),
        next_id: non_empty(&record.next_id),
        previous_ids: record.previous_id.clone().unwrap_or_default(),
        error_id: non_empty(&record.error_id),
        color: non_empty(&record.color).unwrap_or_else(|| kind.default_color().to_string()),
    })
}

fn convert_node_data(kind: NodeKind, record: &LegacyNode) -> NodeData {
    match kind {
        NodeKind::Condition => NodeData::Condition(ConditionData {
            expression: string_or_empty(&record.function_name),
            true_node_id: string_or_empty(&record.true_id),
            false_node_id: string_or_empty(&record.false_id),
        }),
        NodeKind::VarValue => {
            let assignments = record
                .var_id_and_exp_id
                .iter()
                .flatten()
                .map(|(variable_id, expression_id)| Assignment {
                    variable_id: variable_id.clone(),
                    expression_id: expression_id.clone(),
                    value: String::new(),
                })
                .collect();
            NodeData::VarValue(VarValueData {
                assignments: Some(assignments),
            })
        }
        NodeKind::DataTypeConvert => NodeData::DataTypeConvert(DataTypeConvertData {
            source_variable_id: string_or_empty(&record.source_var_id),
            target_variable_id: string_or_empty(&record.out_var_id),
            source_type: code_or_string(&record.in_data_type),
            target_type: code_or_string(&record.out_data_type),
        }),
        NodeKind::CallFlow => NodeData::CallFlow(CallFlowData {
            flow_id: string_or_empty(&record.flow_id),
            flow_name: string_or_empty(&record.flow_name),
            variable_mapping: record.flow_var_contrast.clone().unwrap_or_default(),
        }),
        NodeKind::HttpRequest => NodeData::HttpRequest(HttpRequestData {
            url: string_or_empty(&record.url),
            method: non_empty(&record.method).unwrap_or_else(|| "GET".to_string()),
            headers: record.headers.clone().unwrap_or_default(),
            body: match &record.body {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(body)) => body.clone(),
                Some(other) => other.to_string(),
            },
        }),
        NodeKind::Database => NodeData::Database(DatabaseData {
            connection_id: string_or_empty(&record.connection_id),
            query: string_or_empty(&record.query),
            parameters: record.parameters.clone().unwrap_or_default(),
        }),
        raw_kind => {
            let raw = match &record.data {
                None | Some(Value::Null) => Value::Object(Map::new()),
                Some(data) => data.clone(),
            };
            NodeData::raw(raw_kind, raw).unwrap_or_else(|| NodeData::default_for(raw_kind))
        }
    }
}

fn convert_variable(id: &str, record: &LegacyVariable) -> WorkflowVariable {
    let name = non_empty(&record.text)
        .or_else(|| non_empty(&record.name))
        .unwrap_or_else(|| format!("变量_{}", id));
    let data_type = record
        .data_type
        .as_ref()
        .and_then(data_type_from_code)
        .unwrap_or(DataType::String);

    WorkflowVariable {
        id: id.to_string(),
        name,
        data_type: Some(data_type),
        default_value: record.default_value.clone().filter(|v| !v.is_null()),
        description: record.note.clone(),
        life_cycle: if record.life_cycle.as_deref() == Some(PERSISTENT_LIFE_CYCLE) {
            LifeCycle::Persistent
        } else {
            LifeCycle::Single
        },
        json_nodes: record.json_nodes.clone().unwrap_or_default(),
    }
}

fn convert_expression(id: &str, record: &LegacyExpression) -> Expression {
    let content = match &record.content {
        Some(Value::Array(items)) => items.iter().map(convert_segment).collect(),
        Some(Value::String(text)) => vec![ExpressionSegment::text(text.clone())],
        _ => Vec::new(),
    };

    Expression {
        id: id.to_string(),
        name: non_empty(&record.function_name).unwrap_or_else(|| format!("表达式_{}", id)),
        content,
        return_type: non_empty(&record.return_type).unwrap_or_else(|| "string".to_string()),
    }
}

/// Strings become text; an object with a truthy `Text` becomes a variable
/// reference. Anything else is kept as its JSON text.
fn convert_segment(item: &Value) -> ExpressionSegment {
    match item {
        Value::String(text) => ExpressionSegment::text(text.clone()),
        Value::Object(reference) => match reference.get("Text").filter(|t| is_truthy(t)) {
            Some(text) => ExpressionSegment::Variable {
                value: scalar_text(text).unwrap_or_else(|| text.to_string()),
                variable_id: reference.get("Id").and_then(scalar_text),
            },
            None => ExpressionSegment::text(item.to_string()),
        },
        other => ExpressionSegment::text(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Rebuilds a legacy document from an internal one.
///
/// Edges are ignored: pointer fields come from node `nextId`, `errorId`
/// and payloads only. Kind-specific fields are written for CONDITION,
/// VARVALUE, DATATYPECONVERT and CALLFLOW; other payloads are not carried
/// back.
pub fn to_legacy(workflow: &Workflow) -> LegacyWorkflow {
    LegacyWorkflow {
        id: Some(workflow.id.clone()),
        start_id: Some(workflow.start_id.clone()),
        error_id: workflow.error_id.clone(),
        flow_name: Some(workflow.name.clone()),
        max_parallel: Some(workflow.max_parallel),
        max_queue_length: Some(workflow.max_queue_length),
        execution_timeout_second: Some(workflow.execution_timeout_second),
        process_dic: workflow
            .nodes
            .values()
            .map(|node| (node.id.clone(), node_to_legacy(node)))
            .collect(),
        variable_dic: workflow
            .variables
            .values()
            .map(|variable| (variable.id.clone(), variable_to_legacy(variable)))
            .collect(),
        expression_dic: workflow
            .expressions
            .values()
            .map(|expression| (expression.id.clone(), expression_to_legacy(expression)))
            .collect(),
    }
}

fn node_to_legacy(node: &WorkflowNode) -> LegacyNode {
    let mut record = LegacyNode {
        id: Some(node.id.clone()),
        name: Some(node.name.clone()),
        next_id: Some(node.next_id.clone().unwrap_or_default()),
        previous_id: Some(node.previous_ids.clone()),
        error_id: Some(node.error_id.clone().unwrap_or_default()),
        type_code: Some(node.kind().as_str().to_string()),
        type_name: Some(node.name.clone()),
        node_type: Some(json!(1)),
        color: Some(if node.color.is_empty() {
            FALLBACK_COLOR.to_string()
        } else {
            node.color.clone()
        }),
        ..LegacyNode::default()
    };

    match &node.data {
        NodeData::Condition(condition) => {
            record.function_name = Some(condition.expression.clone());
            record.true_id = Some(condition.true_node_id.clone());
            record.false_id = Some(condition.false_node_id.clone());
        }
        NodeData::VarValue(var_value) => {
            let pairs: BTreeMap<String, String> = var_value
                .assignments
                .iter()
                .flatten()
                .filter(|a| !a.variable_id.is_empty() && !a.expression_id.is_empty())
                .map(|a| (a.variable_id.clone(), a.expression_id.clone()))
                .collect();
            record.var_id_and_exp_id = Some(pairs);
        }
        NodeData::DataTypeConvert(convert) => {
            record.source_var_id = Some(convert.source_variable_id.clone());
            record.out_var_id = Some(convert.target_variable_id.clone());
            record.in_data_type = Some(json!(data_type_code(convert.source_type)));
            record.out_data_type = Some(json!(data_type_code(convert.target_type)));
        }
        NodeData::CallFlow(call) => {
            record.flow_id = Some(call.flow_id.clone());
            record.flow_name = Some(call.flow_name.clone());
            record.flow_var_contrast = Some(call.variable_mapping.clone());
        }
        _ => {}
    }

    record
}

fn variable_to_legacy(variable: &WorkflowVariable) -> LegacyVariable {
    LegacyVariable {
        id: Some(variable.id.clone()),
        text: Some(variable.name.clone()),
        name: Some(variable.name.clone()),
        data_type: Some(json!(data_type_code(
            variable.data_type.unwrap_or_default()
        ))),
        default_value: variable.default_value.clone(),
        note: variable.description.clone(),
        life_cycle: Some(
            match variable.life_cycle {
                LifeCycle::Persistent => PERSISTENT_LIFE_CYCLE,
                LifeCycle::Single => SINGLE_LIFE_CYCLE,
            }
            .to_string(),
        ),
        json_nodes: Some(variable.json_nodes.clone()),
    }
}

fn expression_to_legacy(expression: &Expression) -> LegacyExpression {
    let content = expression
        .content
        .iter()
        .map(|segment| match segment {
            ExpressionSegment::Text { value } => Value::String(value.clone()),
            ExpressionSegment::Variable { value, variable_id } => json!({
                "Id": variable_id,
                "Text": value,
            }),
        })
        .collect();

    LegacyExpression {
        content: Some(Value::Array(content)),
        function_name: Some(expression.name.clone()),
        return_type: Some(expression.return_type.clone()),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

fn string_or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn code_or_string(code: &Option<Value>) -> DataType {
    code.as_ref()
        .and_then(data_type_from_code)
        .unwrap_or(DataType::String)
}

fn positive_or(value: Option<u32>, default: u32) -> u32 {
    value.filter(|v| *v > 0).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy(value: Value) -> LegacyWorkflow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn unknown_type_codes_are_dropped() {
        let workflow = from_legacy(&legacy(json!({
            "ID": "wf",
            "FlowName": "flow",
            "StartID": "s",
            "ProcessDic": {
                "s": { "TypeCode": "START", "NextID": "x" },
                "x": { "TypeCode": "SCRIPT" },
                "y": { "Name": "no type" }
            }
        })));

        assert_eq!(workflow.nodes.len(), 1);
        assert!(workflow.nodes.contains_key("s"));
        assert!(workflow.edges.is_empty());
    }

    #[test]
    fn missing_header_fields_take_defaults() {
        let workflow = from_legacy(&legacy(json!({ "ProcessDic": {}, "MaxParallel": 0 })));

        assert_eq!(workflow.name, UNNAMED_WORKFLOW);
        assert!(!workflow.id.is_empty());
        assert_eq!(workflow.max_parallel, 5);
        assert_eq!(workflow.max_queue_length, 100);
        assert_eq!(workflow.execution_timeout_second, 300);
        assert_eq!(workflow.error_id, None);
    }

    #[test]
    fn unmapped_data_type_codes_default_to_string() {
        let workflow = from_legacy(&legacy(json!({
            "FlowName": "flow",
            "ProcessDic": {
                "c": { "TypeCode": "DATATYPECONVERT", "InDataType": 99, "OutDataType": "33" }
            },
            "VariableDic": {
                "v": { "Id": "v", "DataType": 7 }
            }
        })));

        match &workflow.nodes["c"].data {
            NodeData::DataTypeConvert(convert) => {
                assert_eq!(convert.source_type, DataType::String);
                assert_eq!(convert.target_type, DataType::Json);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(workflow.variables["v"].data_type, Some(DataType::String));
        assert_eq!(workflow.variables["v"].name, "变量_v");
    }

    #[test]
    fn unmapped_kinds_carry_raw_data() {
        let workflow = from_legacy(&legacy(json!({
            "FlowName": "flow",
            "ProcessDic": {
                "j": { "TypeCode": "JsonToJson", "Data": { "mapping": [1, 2] } },
                "l": { "TypeCode": "LOOP" }
            }
        })));

        assert_eq!(
            workflow.nodes["j"].data,
            NodeData::JsonToJson(json!({ "mapping": [1, 2] }))
        );
        assert_eq!(workflow.nodes["l"].data, NodeData::Loop(json!({})));
    }

    #[test]
    fn http_and_database_fields_map_forward() {
        let workflow = from_legacy(&legacy(json!({
            "FlowName": "flow",
            "ProcessDic": {
                "h": {
                    "TypeCode": "HTTP_REQUEST",
                    "Url": "https://example.com/api",
                    "Headers": { "Accept": "application/json" },
                    "Body": { "q": 1 }
                },
                "d": {
                    "TypeCode": "DATABASE",
                    "ConnectionId": "main",
                    "Query": "select 1",
                    "Parameters": [1]
                }
            }
        })));

        match &workflow.nodes["h"].data {
            NodeData::HttpRequest(http) => {
                assert_eq!(http.url, "https://example.com/api");
                assert_eq!(http.method, "GET");
                assert_eq!(http.headers["Accept"], "application/json");
                assert_eq!(http.body, r#"{"q":1}"#);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        match &workflow.nodes["d"].data {
            NodeData::Database(db) => {
                assert_eq!(db.connection_id, "main");
                assert_eq!(db.query, "select 1");
                assert_eq!(db.parameters, vec![json!(1)]);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn expression_content_converts_element_wise() {
        let workflow = from_legacy(&legacy(json!({
            "FlowName": "flow",
            "ProcessDic": {},
            "ExpressionDic": {
                "e1": {
                    "Content": ["return ", { "Id": "v1", "Text": "P_J", "DataType": "33" }, 42, ";"],
                    "FunctionName": "e1"
                },
                "e2": { "Content": "return 1;" }
            }
        })));

        let e1 = &workflow.expressions["e1"];
        assert_eq!(
            e1.content,
            vec![
                ExpressionSegment::text("return "),
                ExpressionSegment::variable("P_J", "v1"),
                ExpressionSegment::text("42"),
                ExpressionSegment::text(";"),
            ]
        );
        assert_eq!(e1.return_type, "string");

        let e2 = &workflow.expressions["e2"];
        assert_eq!(e2.name, "表达式_e2");
        assert_eq!(e2.source_text(), "return 1;");
    }

    #[test]
    fn scalar_reference_text_is_coerced() {
        let workflow = from_legacy(&legacy(json!({
            "FlowName": "flow",
            "ProcessDic": {},
            "ExpressionDic": {
                "e": {
                    "Content": [
                        { "Id": 7, "Text": 42 },
                        { "Id": "v", "Text": true },
                        { "Id": "z", "Text": 0 },
                        { "Id": "y", "Text": "" }
                    ]
                }
            }
        })));

        assert_eq!(
            workflow.expressions["e"].content,
            vec![
                ExpressionSegment::variable("42", "7"),
                ExpressionSegment::variable("true", "v"),
                ExpressionSegment::text(r#"{"Id":"z","Text":0}"#),
                ExpressionSegment::text(r#"{"Id":"y","Text":""}"#),
            ]
        );
    }

    #[test]
    fn reverse_skips_incomplete_assignments() {
        let mut workflow = Workflow::new("flow");
        workflow.add_node(
            WorkflowNode::new("v", NodeKind::VarValue).with_data(NodeData::VarValue(VarValueData {
                assignments: Some(vec![
                    Assignment {
                        variable_id: "a".into(),
                        expression_id: "e".into(),
                        value: String::new(),
                    },
                    Assignment {
                        variable_id: "b".into(),
                        expression_id: String::new(),
                        value: "literal".into(),
                    },
                ]),
            })),
        );

        let legacy = to_legacy(&workflow);
        let pairs = legacy.process_dic["v"].var_id_and_exp_id.clone().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs["a"], "e");
    }

    #[test]
    fn reverse_drops_payloads_without_mapping() {
        let mut workflow = Workflow::new("flow");
        workflow.add_node(WorkflowNode::new("h", NodeKind::HttpRequest));

        let record = &to_legacy(&workflow).process_dic["h"];
        assert_eq!(record.type_code.as_deref(), Some("HTTP_REQUEST"));
        assert_eq!(record.url, None);
        assert_eq!(record.next_id.as_deref(), Some(""));
    }

    #[test]
    fn variables_round_trip_life_cycle() {
        let workflow = from_legacy(&legacy(json!({
            "FlowName": "flow",
            "ProcessDic": {},
            "VariableDic": {
                "p": { "Id": "p", "Text": "kept", "DataType": 1, "LifeCycle": "持久", "Note": "n" },
                "s": { "Id": "s", "Text": "once", "DataType": 3 }
            }
        })));
        assert_eq!(workflow.variables["p"].life_cycle, LifeCycle::Persistent);
        assert_eq!(workflow.variables["s"].life_cycle, LifeCycle::Single);

        let back = to_legacy(&workflow);
        assert_eq!(back.variable_dic["p"].life_cycle.as_deref(), Some("持久"));
        assert_eq!(back.variable_dic["s"].life_cycle.as_deref(), Some("单次"));
        assert_eq!(back.variable_dic["p"].data_type, Some(json!(1)));
        assert_eq!(back.variable_dic["p"].note.as_deref(), Some("n"));
    }
}
