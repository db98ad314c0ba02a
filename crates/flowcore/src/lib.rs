//! Core document model for workflow diagrams
//!
//! This crate defines the workflow document (nodes, edges, variables,
//! expressions), the error types shared by the other crates, and the
//! change events a document store publishes. It performs no I/O.

mod error;
mod events;
mod expression;
mod node;
mod variable;
mod workflow;

pub use error::{FlowError, ImportError, WorkflowError};
pub use events::{Change, EventBus, StoreEvent};
pub use expression::{Expression, ExpressionSegment};
pub use node::{
    Assignment, CallFlowData, ConditionData, DataTypeConvertData, DatabaseData, HttpRequestData,
    NodeData, NodeKind, VarValueData,
};
pub use variable::{DataType, JsonNode, JsonNodeType, LifeCycle, WorkflowVariable};
pub use workflow::{
    EdgeType, Position, Workflow, WorkflowEdge, WorkflowNode, DEFAULT_EXECUTION_TIMEOUT_SECOND,
    DEFAULT_MAX_PARALLEL, DEFAULT_MAX_QUEUE_LENGTH,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
