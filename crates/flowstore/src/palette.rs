use flowcore::{NodeData, NodeKind, Position, WorkflowNode};
use serde::Serialize;
use uuid::Uuid;

/// Palette entry the editor offers for a node kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    /// Default payload, serialized in the node's `{type, data}` form.
    pub default_data: NodeData,
}

impl NodeTemplate {
    pub fn for_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            name: kind.default_name(),
            description: kind.description(),
            color: kind.default_color(),
            default_data: NodeData::default_for(kind),
        }
    }

    /// Places a fresh node of this kind with a new UUID.
    pub fn instantiate(&self, position: Position) -> WorkflowNode {
        let mut node = WorkflowNode::new(Uuid::new_v4().to_string(), self.kind)
            .with_name(self.name)
            .with_data(self.default_data.clone());
        node.position = Some(position);
        node.color = self.color.to_string();
        node
    }
}

/// Every node kind, in palette order.
pub fn node_palette() -> Vec<NodeTemplate> {
    NodeKind::ALL.iter().copied().map(NodeTemplate::for_kind).collect()
}
