//! Observable workflow document store
//!
//! This crate provides the mutable document holder an editor works
//! against: CRUD over nodes, edges, variables and expressions, selection
//! state, and a broadcast channel of change events.

mod palette;
mod patch;
mod store;

pub use palette::{node_palette, NodeTemplate};
pub use patch::{EdgePatch, ExpressionPatch, NodePatch, VariablePatch, WorkflowPatch};
pub use store::{StoreConfig, WorkflowStore};
