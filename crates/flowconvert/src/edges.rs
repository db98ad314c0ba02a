use flowcore::{EdgeType, NodeData, WorkflowEdge, WorkflowNode};
use std::collections::BTreeMap;

pub const TRUE_LABEL: &str = "真";
pub const FALSE_LABEL: &str = "假";
pub const ERROR_LABEL: &str = "错误";

/// Derives the edge list from node pointers.
///
/// Per node, in order: the `nextId` link (`default`), the true branch of a
/// condition (`success`, 真), its false branch (`default`, 假), then the
/// `errorId` link (`error`, 错误). Pointers that do not resolve in `nodes`
/// produce no edge. Edge ids are `<source>-<slot>`, so the same nodes always
/// yield the same edges.
pub fn synthesize_edges(nodes: &BTreeMap<String, WorkflowNode>) -> Vec<WorkflowEdge> {
    let mut edges = Vec::new();

    for node in nodes.values() {
        let mut link = |slot: &str, target: &str, edge_type: EdgeType, label: Option<&str>| {
            if target.is_empty() {
                return;
            }
            if !nodes.contains_key(target) {
                tracing::debug!(
                    "Skipping {} edge from {}: target {} does not exist",
                    slot,
                    node.id,
                    target
                );
                return;
            }
            let mut edge =
                WorkflowEdge::new(format!("{}-{}", node.id, slot), &node.id, target, edge_type);
            edge.label = label.map(str::to_string);
            edges.push(edge);
        };

        if let Some(next_id) = &node.next_id {
            link("next", next_id.as_str(), EdgeType::Default, None);
        }

        if let NodeData::Condition(condition) = &node.data {
            link(
                "true",
                condition.true_node_id.as_str(),
                EdgeType::Success,
                Some(TRUE_LABEL),
            );
            link(
                "false",
                condition.false_node_id.as_str(),
                EdgeType::Default,
                Some(FALSE_LABEL),
            );
        }

        if let Some(error_id) = &node.error_id {
            link("error", error_id.as_str(), EdgeType::Error, Some(ERROR_LABEL));
        }
    }

    edges
}
