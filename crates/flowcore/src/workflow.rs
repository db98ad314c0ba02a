use crate::{Expression, NodeData, NodeKind, WorkflowVariable};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

pub const DEFAULT_MAX_PARALLEL: u32 = 5;
pub const DEFAULT_MAX_QUEUE_LENGTH: u32 = 100;
pub const DEFAULT_EXECUTION_TIMEOUT_SECOND: u32 = 300;

/// Complete workflow document
///
/// Cross references (`start_id`, edge endpoints, node pointers) are plain
/// identifiers resolved through the maps at use time. Nothing here keeps
/// them consistent; the validator reports dangling ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: u32,
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: u32,
    #[serde(default = "default_execution_timeout_second")]
    pub execution_timeout_second: u32,
    #[serde(default)]
    pub nodes: BTreeMap<String, WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub variables: BTreeMap<String, WorkflowVariable>,
    #[serde(default)]
    pub expressions: BTreeMap<String, Expression>,
}

fn default_max_parallel() -> u32 {
    DEFAULT_MAX_PARALLEL
}

fn default_max_queue_length() -> u32 {
    DEFAULT_MAX_QUEUE_LENGTH
}

fn default_execution_timeout_second() -> u32 {
    DEFAULT_EXECUTION_TIMEOUT_SECOND
}

impl Workflow {
    /// Empty document with a fresh id and default execution hints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            start_id: String::new(),
            error_id: None,
            max_parallel: DEFAULT_MAX_PARALLEL,
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            execution_timeout_second: DEFAULT_EXECUTION_TIMEOUT_SECOND,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            variables: BTreeMap::new(),
            expressions: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, node: WorkflowNode) -> String {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    pub fn find_node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    pub fn find_edge(&self, id: &str) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.values().filter(move |n| n.kind() == kind)
    }

    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Rebuilds every node's `previous_ids` from the edge list.
    ///
    /// `previous_ids` is a cache; call this after editing edges or nodes
    /// outside the store.
    pub fn refresh_previous_ids(&mut self) {
        let mut incoming: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for edge in &self.edges {
            incoming
                .entry(edge.target.as_str())
                .or_default()
                .insert(edge.source.as_str());
        }

        let rebuilt: BTreeMap<String, Vec<String>> = self
            .nodes
            .keys()
            .map(|id| {
                let sources = incoming
                    .get(id.as_str())
                    .map(|set| set.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default();
                (id.clone(), sources)
            })
            .collect();

        for (id, previous) in rebuilt {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.previous_ids = previous;
            }
        }
    }
}

/// A step in the flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    #[serde(default)]
    pub id: String,
    /// Carries both the `type` discriminant and its `data` payload.
    #[serde(flatten)]
    pub data: NodeData,
    #[serde(default)]
    pub name: String,
    /// `None` when the document gave no usable coordinates.
    #[serde(
        default,
        deserialize_with = "lenient_position",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
    #[serde(default)]
    pub previous_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(default)]
    pub color: String,
}

impl WorkflowNode {
    /// Node with the palette defaults for `kind`.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            data: NodeData::default_for(kind),
            name: kind.default_name().to_string(),
            position: Some(Position::default()),
            next_id: None,
            previous_ids: Vec::new(),
            error_id: None,
            color: kind.default_color().to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    pub fn with_next(mut self, next_id: impl Into<String>) -> Self {
        self.next_id = Some(next_id.into());
        self
    }

    pub fn with_error(mut self, error_id: impl Into<String>) -> Self {
        self.error_id = Some(error_id.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

fn lenient_position<'de, D>(deserializer: D) -> Result<Option<Position>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Node position in the visual editor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Directed connection between nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default)]
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl WorkflowEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: EdgeType,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            edge_type,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    #[default]
    Default,
    Success,
    Error,
}
