use crate::palette::NodeTemplate;
use crate::patch::{EdgePatch, ExpressionPatch, NodePatch, VariablePatch, WorkflowPatch};
use chrono::Utc;
use flowcore::{
    Change, DataType, EdgeType, EventBus, Expression, ExpressionSegment, NodeData, NodeKind,
    Position, StoreEvent, Workflow, WorkflowEdge, WorkflowError, WorkflowNode, WorkflowVariable,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Editable workflow document with selection state
///
/// Holds at most one document. Every mutation publishes a [`StoreEvent`] on
/// the store's [`EventBus`]; mutations made while no document is loaded fail
/// with [`WorkflowError::NoDocument`].
pub struct WorkflowStore {
    workflow: Option<Workflow>,
    selected_node_id: Option<String>,
    selected_edge_id: Option<String>,
    event_bus: Arc<EventBus>,
}

impl WorkflowStore {
    /// Create an empty store with default settings
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_event_bus(Arc::new(EventBus::new(config.event_buffer_size)))
    }

    /// Create an empty store publishing on a shared bus
    pub fn with_event_bus(event_bus: Arc<EventBus>) -> Self {
        Self {
            workflow: None,
            selected_node_id: None,
            selected_edge_id: None,
            event_bus,
        }
    }

    /// Subscribe to store events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()
    }

    pub fn selected_node_id(&self) -> Option<&str> {
        self.selected_node_id.as_deref()
    }

    pub fn selected_edge_id(&self) -> Option<&str> {
        self.selected_edge_id.as_deref()
    }

    fn document(&self) -> Result<&Workflow, WorkflowError> {
        self.workflow.as_ref().ok_or(WorkflowError::NoDocument)
    }

    fn document_mut(&mut self) -> Result<&mut Workflow, WorkflowError> {
        self.workflow.as_mut().ok_or(WorkflowError::NoDocument)
    }

    /// Replace the document with a new one holding a START and an END node.
    pub fn create_workflow(&mut self, name: impl Into<String>) -> String {
        let mut workflow = Workflow::new(name);

        let start = NodeTemplate::for_kind(NodeKind::Start).instantiate(Position::new(100.0, 100.0));
        let end = NodeTemplate::for_kind(NodeKind::End).instantiate(Position::new(400.0, 100.0));
        workflow.start_id = workflow.add_node(start);
        workflow.add_node(end);

        self.load_workflow(workflow)
    }

    /// Replace the document and clear the selection.
    pub fn load_workflow(&mut self, workflow: Workflow) -> String {
        let workflow_id = workflow.id.clone();
        tracing::info!(
            "Loaded workflow {} ({}) with {} nodes",
            workflow_id,
            workflow.name,
            workflow.nodes.len()
        );

        self.workflow = Some(workflow);
        self.selected_node_id = None;
        self.selected_edge_id = None;
        self.event_bus.emit(StoreEvent::WorkflowLoaded {
            workflow_id: workflow_id.clone(),
            timestamp: Utc::now(),
        });
        workflow_id
    }

    pub fn update_workflow(&mut self, patch: WorkflowPatch) -> Result<(), WorkflowError> {
        let workflow = self.document_mut()?;
        patch.apply(workflow);
        let workflow_id = workflow.id.clone();

        self.event_bus.emit(StoreEvent::WorkflowUpdated {
            workflow_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Place a node of `kind` with the palette defaults.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> Result<String, WorkflowError> {
        let node = NodeTemplate::for_kind(kind).instantiate(position);
        let node_id = self.document_mut()?.add_node(node);

        tracing::debug!("Added {} node {}", kind, node_id);
        self.event_bus.emit(StoreEvent::NodeAdded {
            node_id: node_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(node_id)
    }

    pub fn update_node(&mut self, node_id: &str, patch: NodePatch) -> Result<(), WorkflowError> {
        let node = self
            .document_mut()?
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))?;
        patch.apply(node);

        self.event_bus.emit(StoreEvent::NodeUpdated {
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Delete a node and every edge touching it.
    ///
    /// Edges go through [`delete_edge`](Self::delete_edge), so pointers on the
    /// surviving endpoints are cleared as well.
    pub fn delete_node(&mut self, node_id: &str) -> Result<(), WorkflowError> {
        let touching: Vec<String> = {
            let workflow = self.document()?;
            if !workflow.nodes.contains_key(node_id) {
                return Err(WorkflowError::NodeNotFound(node_id.to_string()));
            }
            workflow
                .edges
                .iter()
                .filter(|e| e.source == node_id || e.target == node_id)
                .map(|e| e.id.clone())
                .collect()
        };

        for edge_id in touching {
            self.delete_edge(&edge_id)?;
        }

        self.document_mut()?.nodes.remove(node_id);
        if self.selected_node_id.as_deref() == Some(node_id) {
            self.selected_node_id = None;
        }

        tracing::debug!("Deleted node {}", node_id);
        self.event_bus.emit(StoreEvent::NodeDeleted {
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Select a node (or nothing); clears any edge selection.
    pub fn select_node(&mut self, node_id: Option<&str>) -> Result<(), WorkflowError> {
        if let Some(id) = node_id {
            if !self.document()?.nodes.contains_key(id) {
                return Err(WorkflowError::NodeNotFound(id.to_string()));
            }
        }
        self.selected_node_id = node_id.map(str::to_string);
        self.selected_edge_id = None;
        self.emit_selection();
        Ok(())
    }

    /// Connect two nodes and update the pointers the edge implies.
    ///
    /// The target gains the source in `previous_ids`. On the source, a
    /// `default` edge sets `next_id` for single-successor kinds and the false
    /// branch for conditions, a `success` edge sets a condition's true branch,
    /// and an `error` edge sets `error_id`.
    pub fn add_edge(
        &mut self,
        source_id: &str,
        target_id: &str,
        edge_type: EdgeType,
    ) -> Result<String, WorkflowError> {
        let workflow = self.document_mut()?;
        for id in [source_id, target_id] {
            if !workflow.nodes.contains_key(id) {
                return Err(WorkflowError::NodeNotFound(id.to_string()));
            }
        }

        let edge_id = Uuid::new_v4().to_string();
        workflow
            .edges
            .push(WorkflowEdge::new(&edge_id, source_id, target_id, edge_type));

        if let Some(target) = workflow.nodes.get_mut(target_id) {
            if !target.previous_ids.iter().any(|id| id == source_id) {
                target.previous_ids.push(source_id.to_string());
            }
        }
        if let Some(source) = workflow.nodes.get_mut(source_id) {
            link_pointer(source, target_id, edge_type);
        }

        tracing::debug!(
            "Added {:?} edge {} from {} to {}",
            edge_type,
            edge_id,
            source_id,
            target_id
        );
        self.event_bus.emit(StoreEvent::EdgeAdded {
            edge_id: edge_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(edge_id)
    }

    pub fn update_edge(&mut self, edge_id: &str, patch: EdgePatch) -> Result<(), WorkflowError> {
        let edge = self
            .document_mut()?
            .edges
            .iter_mut()
            .find(|e| e.id == edge_id)
            .ok_or_else(|| WorkflowError::EdgeNotFound(edge_id.to_string()))?;
        patch.apply(edge);

        self.event_bus.emit(StoreEvent::EdgeUpdated {
            edge_id: edge_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Remove an edge and undo the pointer updates [`add_edge`](Self::add_edge) made.
    ///
    /// A pointer or `previous_ids` entry survives while another edge still
    /// provides it.
    pub fn delete_edge(&mut self, edge_id: &str) -> Result<(), WorkflowError> {
        let workflow = self.document_mut()?;
        let index = workflow
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| WorkflowError::EdgeNotFound(edge_id.to_string()))?;
        let edge = workflow.edges.remove(index);

        let still_joined = workflow
            .edges
            .iter()
            .any(|e| e.source == edge.source && e.target == edge.target);
        let still_typed = workflow.edges.iter().any(|e| {
            e.source == edge.source && e.target == edge.target && e.edge_type == edge.edge_type
        });

        if !still_joined {
            if let Some(target) = workflow.nodes.get_mut(&edge.target) {
                target.previous_ids.retain(|id| *id != edge.source);
            }
        }
        if !still_typed {
            // Newest remaining edge of the same type takes over the pointer.
            let fallback = workflow
                .edges
                .iter()
                .rev()
                .find(|e| e.source == edge.source && e.edge_type == edge.edge_type)
                .map(|e| e.target.clone());
            if let Some(source) = workflow.nodes.get_mut(&edge.source) {
                if unlink_pointer(source, &edge.target, edge.edge_type) {
                    if let Some(target_id) = fallback {
                        link_pointer(source, &target_id, edge.edge_type);
                    }
                }
            }
        }

        if self.selected_edge_id.as_deref() == Some(edge_id) {
            self.selected_edge_id = None;
        }

        tracing::debug!("Deleted edge {}", edge_id);
        self.event_bus.emit(StoreEvent::EdgeDeleted {
            edge_id: edge_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Select an edge (or nothing); clears any node selection.
    pub fn select_edge(&mut self, edge_id: Option<&str>) -> Result<(), WorkflowError> {
        if let Some(id) = edge_id {
            if self.document()?.find_edge(id).is_none() {
                return Err(WorkflowError::EdgeNotFound(id.to_string()));
            }
        }
        self.selected_edge_id = edge_id.map(str::to_string);
        self.selected_node_id = None;
        self.emit_selection();
        Ok(())
    }

    /// Declare a single-run variable.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
    ) -> Result<String, WorkflowError> {
        let variable_id = Uuid::new_v4().to_string();
        let variable = WorkflowVariable::new(&variable_id, name, data_type);
        self.document_mut()?
            .variables
            .insert(variable_id.clone(), variable);

        self.emit_variable(&variable_id, Change::Added);
        Ok(variable_id)
    }

    pub fn update_variable(
        &mut self,
        variable_id: &str,
        patch: VariablePatch,
    ) -> Result<(), WorkflowError> {
        let variable = self
            .document_mut()?
            .variables
            .get_mut(variable_id)
            .ok_or_else(|| WorkflowError::VariableNotFound(variable_id.to_string()))?;
        patch.apply(variable);

        self.emit_variable(variable_id, Change::Updated);
        Ok(())
    }

    /// Remove a variable. References to it from nodes and expressions are
    /// left for the validator to report.
    pub fn delete_variable(&mut self, variable_id: &str) -> Result<(), WorkflowError> {
        self.document_mut()?
            .variables
            .remove(variable_id)
            .ok_or_else(|| WorkflowError::VariableNotFound(variable_id.to_string()))?;

        self.emit_variable(variable_id, Change::Deleted);
        Ok(())
    }

    /// Add an expression whose content is a single text segment.
    pub fn add_expression(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<String, WorkflowError> {
        let expression_id = Uuid::new_v4().to_string();
        let expression = Expression {
            id: expression_id.clone(),
            name: name.into(),
            content: vec![ExpressionSegment::text(content)],
            return_type: "string".to_string(),
        };
        self.document_mut()?
            .expressions
            .insert(expression_id.clone(), expression);

        self.emit_expression(&expression_id, Change::Added);
        Ok(expression_id)
    }

    pub fn update_expression(
        &mut self,
        expression_id: &str,
        patch: ExpressionPatch,
    ) -> Result<(), WorkflowError> {
        let expression = self
            .document_mut()?
            .expressions
            .get_mut(expression_id)
            .ok_or_else(|| WorkflowError::ExpressionNotFound(expression_id.to_string()))?;
        patch.apply(expression);

        self.emit_expression(expression_id, Change::Updated);
        Ok(())
    }

    pub fn delete_expression(&mut self, expression_id: &str) -> Result<(), WorkflowError> {
        self.document_mut()?
            .expressions
            .remove(expression_id)
            .ok_or_else(|| WorkflowError::ExpressionNotFound(expression_id.to_string()))?;

        self.emit_expression(expression_id, Change::Deleted);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected_node_id = None;
        self.selected_edge_id = None;
        self.emit_selection();
    }

    /// Drop the document and selection.
    pub fn reset(&mut self) {
        self.workflow = None;
        self.selected_node_id = None;
        self.selected_edge_id = None;
        self.event_bus.emit(StoreEvent::Reset {
            timestamp: Utc::now(),
        });
    }

    /// Take the document out, leaving the store empty without an event.
    pub fn into_workflow(self) -> Option<Workflow> {
        self.workflow
    }

    fn emit_selection(&self) {
        self.event_bus.emit(StoreEvent::SelectionChanged {
            node_id: self.selected_node_id.clone(),
            edge_id: self.selected_edge_id.clone(),
            timestamp: Utc::now(),
        });
    }

    fn emit_variable(&self, variable_id: &str, change: Change) {
        self.event_bus.emit(StoreEvent::VariableChanged {
            variable_id: variable_id.to_string(),
            change,
            timestamp: Utc::now(),
        });
    }

    fn emit_expression(&self, expression_id: &str, change: Change) {
        self.event_bus.emit(StoreEvent::ExpressionChanged {
            expression_id: expression_id.to_string(),
            change,
            timestamp: Utc::now(),
        });
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

fn link_pointer(source: &mut WorkflowNode, target_id: &str, edge_type: EdgeType) {
    let kind = source.kind();
    match (edge_type, &mut source.data) {
        (EdgeType::Error, _) => source.error_id = Some(target_id.to_string()),
        (EdgeType::Success, NodeData::Condition(condition)) => {
            condition.true_node_id = target_id.to_string();
        }
        (EdgeType::Default, NodeData::Condition(condition)) => {
            condition.false_node_id = target_id.to_string();
        }
        (EdgeType::Default, _) if kind.has_single_successor() => {
            source.next_id = Some(target_id.to_string());
        }
        _ => {}
    }
}

/// Clears the pointer `edge_type` set on `source` if it targets `target_id`.
/// Returns whether anything was cleared.
fn unlink_pointer(source: &mut WorkflowNode, target_id: &str, edge_type: EdgeType) -> bool {
    let kind = source.kind();
    match (edge_type, &mut source.data) {
        (EdgeType::Error, _) if source.error_id.as_deref() == Some(target_id) => {
            source.error_id = None;
            true
        }
        (EdgeType::Success, NodeData::Condition(condition))
            if condition.true_node_id == target_id =>
        {
            condition.true_node_id.clear();
            true
        }
        (EdgeType::Default, NodeData::Condition(condition))
            if condition.false_node_id == target_id =>
        {
            condition.false_node_id.clear();
            true
        }
        (EdgeType::Default, _)
            if kind.has_single_successor() && source.next_id.as_deref() == Some(target_id) =>
        {
            source.next_id = None;
            true
        }
        _ => false,
    }
}

/// Configuration for the store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub event_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}
