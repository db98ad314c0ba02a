//! Partial updates applied by the store's `update_*` operations.
//!
//! Every field is optional; `None` leaves the target untouched. For optional
//! pointer fields (`errorId`, `nextId`, edge `label`) an empty string clears
//! the value.

use flowcore::{
    DataType, EdgeType, Expression, ExpressionSegment, JsonNode, LifeCycle, NodeData, Position,
    Workflow, WorkflowEdge, WorkflowNode, WorkflowVariable,
};
use serde::Deserialize;
use serde_json::Value;

fn clearable(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowPatch {
    pub name: Option<String>,
    pub start_id: Option<String>,
    pub error_id: Option<String>,
    pub max_parallel: Option<u32>,
    pub max_queue_length: Option<u32>,
    pub execution_timeout_second: Option<u32>,
}

impl WorkflowPatch {
    pub fn apply(self, workflow: &mut Workflow) {
        if let Some(name) = self.name {
            workflow.name = name;
        }
        if let Some(start_id) = self.start_id {
            workflow.start_id = start_id;
        }
        if let Some(error_id) = self.error_id {
            workflow.error_id = clearable(error_id);
        }
        if let Some(max_parallel) = self.max_parallel {
            workflow.max_parallel = max_parallel;
        }
        if let Some(max_queue_length) = self.max_queue_length {
            workflow.max_queue_length = max_queue_length;
        }
        if let Some(timeout) = self.execution_timeout_second {
            workflow.execution_timeout_second = timeout;
        }
    }
}

/// Shallow node update.
///
/// Replacing `data` with a payload of another kind changes the node's kind;
/// edges and pointers are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodePatch {
    pub name: Option<String>,
    pub position: Option<Position>,
    pub data: Option<NodeData>,
    pub next_id: Option<String>,
    pub previous_ids: Option<Vec<String>>,
    pub error_id: Option<String>,
    pub color: Option<String>,
}

impl NodePatch {
    pub fn apply(self, node: &mut WorkflowNode) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(position) = self.position {
            node.position = Some(position);
        }
        if let Some(data) = self.data {
            node.data = data;
        }
        if let Some(next_id) = self.next_id {
            node.next_id = clearable(next_id);
        }
        if let Some(previous_ids) = self.previous_ids {
            node.previous_ids = previous_ids;
        }
        if let Some(error_id) = self.error_id {
            node.error_id = clearable(error_id);
        }
        if let Some(color) = self.color {
            node.color = color;
        }
    }
}

/// Edge update. Node pointers are not re-synchronized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgePatch {
    pub source: Option<String>,
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub edge_type: Option<EdgeType>,
    pub label: Option<String>,
}

impl EdgePatch {
    pub fn apply(self, edge: &mut WorkflowEdge) {
        if let Some(source) = self.source {
            edge.source = source;
        }
        if let Some(target) = self.target {
            edge.target = target;
        }
        if let Some(edge_type) = self.edge_type {
            edge.edge_type = edge_type;
        }
        if let Some(label) = self.label {
            edge.label = clearable(label);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VariablePatch {
    pub name: Option<String>,
    pub data_type: Option<DataType>,
    pub default_value: Option<Value>,
    pub description: Option<String>,
    pub life_cycle: Option<LifeCycle>,
    pub json_nodes: Option<Vec<JsonNode>>,
}

impl VariablePatch {
    pub fn apply(self, variable: &mut WorkflowVariable) {
        if let Some(name) = self.name {
            variable.name = name;
        }
        if let Some(data_type) = self.data_type {
            variable.data_type = Some(data_type);
        }
        if let Some(default_value) = self.default_value {
            variable.default_value = Some(default_value);
        }
        if let Some(description) = self.description {
            variable.description = clearable(description);
        }
        if let Some(life_cycle) = self.life_cycle {
            variable.life_cycle = life_cycle;
        }
        if let Some(json_nodes) = self.json_nodes {
            variable.json_nodes = json_nodes;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpressionPatch {
    pub name: Option<String>,
    pub content: Option<Vec<ExpressionSegment>>,
    pub return_type: Option<String>,
}

impl ExpressionPatch {
    pub fn apply(self, expression: &mut Expression) {
        if let Some(name) = self.name {
            expression.name = name;
        }
        if let Some(content) = self.content {
            expression.content = content;
        }
        if let Some(return_type) = self.return_type {
            expression.return_type = return_type;
        }
    }
}
