use crate::result::{Severity, ValidationIssue, ValidationResult};
use flowcore::{EdgeType, NodeData, NodeKind, Workflow, WorkflowNode};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// Checks a workflow for structural and semantic problems.
pub fn validate_workflow(workflow: &Workflow) -> ValidationResult {
    WorkflowValidator::new(workflow).validate()
}

/// Accumulates findings over a single validation run.
///
/// Passes run in a fixed order: basic structure, nodes (fields, kind
/// specific rules, connectivity), edges and cycles, variables, expressions.
/// Everything after the basic pass is skipped when the workflow has no
/// nodes.
pub struct WorkflowValidator<'a> {
    workflow: &'a Workflow,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl<'a> WorkflowValidator<'a> {
    pub fn new(workflow: &'a Workflow) -> Self {
        Self {
            workflow,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn validate(mut self) -> ValidationResult {
        if self.validate_basic_structure() {
            self.validate_nodes();
            self.validate_edges();
            self.detect_cycles();
            self.validate_variables();
            self.validate_expressions();
        }

        tracing::debug!(
            "Validated workflow {}: {} errors, {} warnings",
            self.workflow.id,
            self.errors.len(),
            self.warnings.len()
        );
        ValidationResult::new(self.errors, self.warnings)
    }

    fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    fn warn(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Returns false when there are no nodes to check further.
    fn validate_basic_structure(&mut self) -> bool {
        let workflow = self.workflow;

        if workflow.name.trim().is_empty() {
            self.warn(ValidationIssue::warning("Workflow has no name"));
        }

        if workflow.nodes.is_empty() {
            self.error(ValidationIssue::error(
                "Workflow must contain at least one node",
            ));
            return false;
        }

        match workflow.nodes_of_kind(NodeKind::Start).count() {
            0 => self.error(ValidationIssue::error("Workflow must contain a start node")),
            1 => {}
            _ => self.error(ValidationIssue::error(
                "Workflow can only contain one start node",
            )),
        }

        if workflow.nodes_of_kind(NodeKind::End).next().is_none() {
            self.warn(ValidationIssue::warning(
                "Workflow should contain at least one end node",
            ));
        }

        if !workflow.start_id.is_empty() && !workflow.nodes.contains_key(&workflow.start_id) {
            self.error(ValidationIssue::error(format!(
                "Start node {} does not exist",
                workflow.start_id
            )));
        }

        if let Some(error_id) = workflow.error_id.as_deref().filter(|id| !id.is_empty()) {
            if !workflow.nodes.contains_key(error_id) {
                self.error(ValidationIssue::error(format!(
                    "Error handler node {} does not exist",
                    error_id
                )));
            }
        }

        true
    }

    fn validate_nodes(&mut self) {
        let workflow = self.workflow;
        for node in workflow.nodes.values() {
            self.validate_node_fields(node);
            self.validate_node_kind(node);
            self.validate_node_connections(node);
        }
    }

    fn validate_node_fields(&mut self, node: &WorkflowNode) {
        if node.id.is_empty() {
            self.error(ValidationIssue::error("Node is missing an id").on_node(&node.id));
        }

        if node.name.trim().is_empty() {
            self.warn(
                ValidationIssue::warning(format!("Node {} has no name", node.id)).on_node(&node.id),
            );
        }

        if !node.position.is_some_and(|p| p.is_finite()) {
            self.error(
                ValidationIssue::error(format!("Node {} has an invalid position", node.id))
                    .on_node(&node.id),
            );
        }
    }

    fn validate_node_kind(&mut self, node: &WorkflowNode) {
        let name = &node.name;
        let mut findings: Vec<ValidationIssue> = Vec::new();

        match &node.data {
            NodeData::Condition(condition) => {
                if condition.expression.is_empty() {
                    findings.push(ValidationIssue::error(format!(
                        "Condition node {} has no condition expression",
                        name
                    )));
                }

                let workflow = self.workflow;
                let has_true = workflow
                    .outgoing_edges(&node.id)
                    .any(|e| e.edge_type == EdgeType::Success);
                let has_false = workflow.outgoing_edges(&node.id).any(|e| {
                    e.edge_type == EdgeType::Default
                        && (condition.false_node_id.is_empty()
                            || e.target == condition.false_node_id)
                });

                if !has_true {
                    findings.push(ValidationIssue::warning(format!(
                        "Condition node {} has no true branch connection",
                        name
                    )));
                }
                if !has_false {
                    findings.push(ValidationIssue::warning(format!(
                        "Condition node {} has no false branch connection",
                        name
                    )));
                }
            }
            NodeData::VarValue(var_value) => {
                let Some(assignments) = &var_value.assignments else {
                    self.warn(
                        ValidationIssue::warning(format!(
                            "Assignment node {} has no assignments configured",
                            name
                        ))
                        .on_node(&node.id),
                    );
                    return;
                };

                for (index, assignment) in assignments.iter().enumerate() {
                    let position = index + 1;
                    if assignment.variable_id.is_empty() {
                        findings.push(ValidationIssue::error(format!(
                            "Assignment {} of node {} has no variable",
                            position, name
                        )));
                    } else if !self.workflow.variables.contains_key(&assignment.variable_id) {
                        findings.push(ValidationIssue::error(format!(
                            "Assignment node {} references unknown variable {}",
                            name, assignment.variable_id
                        )));
                    }

                    if assignment.value.is_empty() && assignment.expression_id.is_empty() {
                        findings.push(ValidationIssue::warning(format!(
                            "Assignment {} of node {} has neither a value nor an expression",
                            position, name
                        )));
                    }
                }
            }
            NodeData::HttpRequest(http) => {
                if http.url.is_empty() {
                    findings.push(ValidationIssue::error(format!(
                        "HTTP request node {} is missing a URL",
                        name
                    )));
                } else if let Err(e) = Url::parse(&http.url) {
                    findings.push(ValidationIssue::error(format!(
                        "HTTP request node {} has an invalid URL: {}",
                        name, e
                    )));
                }

                if http.method.is_empty() {
                    findings.push(ValidationIssue::warning(format!(
                        "HTTP request node {} has no method, GET will be used",
                        name
                    )));
                }
            }
            NodeData::Database(database) => {
                if database.query.is_empty() {
                    findings.push(ValidationIssue::error(format!(
                        "Database node {} is missing a SQL query",
                        name
                    )));
                }
                if database.connection_id.is_empty() {
                    findings.push(ValidationIssue::error(format!(
                        "Database node {} is missing a connection id",
                        name
                    )));
                }
            }
            NodeData::CallFlow(call) => {
                if call.flow_id.is_empty() {
                    findings.push(ValidationIssue::error(format!(
                        "Call flow node {} is missing a flow id",
                        name
                    )));
                }
            }
            _ => {}
        }

        for finding in findings {
            let finding = finding.on_node(&node.id);
            match finding.severity {
                Severity::Error => self.error(finding),
                Severity::Warning => self.warn(finding),
            }
        }
    }

    fn validate_node_connections(&mut self, node: &WorkflowNode) {
        let kind = node.kind();

        if kind != NodeKind::Start && self.workflow.incoming_edges(&node.id).next().is_none() {
            self.warn(
                ValidationIssue::warning(format!("Node {} has no incoming connection", node.name))
                    .on_node(&node.id),
            );
        }

        if kind != NodeKind::End && self.workflow.outgoing_edges(&node.id).next().is_none() {
            self.warn(
                ValidationIssue::warning(format!("Node {} has no outgoing connection", node.name))
                    .on_node(&node.id),
            );
        }
    }

    fn validate_edges(&mut self) {
        let workflow = self.workflow;

        for edge in &workflow.edges {
            if !workflow.nodes.contains_key(&edge.source) {
                self.error(ValidationIssue::error(format!(
                    "Edge {} source node {} does not exist",
                    edge.id, edge.source
                )));
            }

            if !workflow.nodes.contains_key(&edge.target) {
                self.error(ValidationIssue::error(format!(
                    "Edge {} target node {} does not exist",
                    edge.id, edge.target
                )));
            }

            if edge.source == edge.target {
                self.error(ValidationIssue::error(format!(
                    "Edge {} cannot connect a node to itself",
                    edge.id
                )));
            }
        }
    }

    /// Reports at most one warning, without naming the nodes involved.
    fn detect_cycles(&mut self) {
        let workflow = self.workflow;
        let mut graph = DiGraph::<&str, ()>::new();
        let mut node_to_index = HashMap::new();

        for id in workflow.nodes.keys() {
            let idx = graph.add_node(id.as_str());
            node_to_index.insert(id.as_str(), idx);
        }

        for edge in &workflow.edges {
            if let (Some(from), Some(to)) = (
                node_to_index.get(edge.source.as_str()),
                node_to_index.get(edge.target.as_str()),
            ) {
                graph.add_edge(*from, *to, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            tracing::debug!(
                "Cycle found in workflow {} through node {}",
                workflow.id,
                graph[cycle.node_id()]
            );
            self.warn(ValidationIssue::warning(
                "Cyclic dependency detected in workflow",
            ));
        }
    }

    fn validate_variables(&mut self) {
        let workflow = self.workflow;
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        let mut duplicates: Vec<&str> = Vec::new();

        for variable in workflow.variables.values() {
            let name = variable.name.trim();
            if name.is_empty() {
                self.error(ValidationIssue::error(format!(
                    "Variable {} is missing a name",
                    variable.id
                )));
            } else {
                let count = seen.entry(variable.name.as_str()).or_insert(0);
                *count += 1;
                if *count == 2 {
                    duplicates.push(variable.name.as_str());
                }
            }

            if variable.data_type.is_none() {
                self.error(ValidationIssue::error(format!(
                    "Variable {} is missing a data type",
                    variable.name
                )));
            }
        }

        if !duplicates.is_empty() {
            self.warn(ValidationIssue::warning(format!(
                "Duplicate variable names: {}",
                duplicates.join(", ")
            )));
        }
    }

    fn validate_expressions(&mut self) {
        for expression in self.workflow.expressions.values() {
            if expression.name.trim().is_empty() {
                self.error(ValidationIssue::error(format!(
                    "Expression {} is missing a name",
                    expression.id
                )));
            }

            if expression.content.is_empty() {
                self.error(ValidationIssue::error(format!(
                    "Expression {} has no content",
                    expression.name
                )));
            }

            if expression.return_type.is_empty() {
                self.warn(ValidationIssue::warning(format!(
                    "Expression {} has no return type",
                    expression.name
                )));
            }
        }
    }
}
