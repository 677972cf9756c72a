//! Flow graphs and the executors of their nodes.

pub mod actions;
pub mod condition;
pub mod consts;
mod graph;
mod node;
pub mod platform;
pub mod template;

/// node id
pub type NodeId = String;

pub use graph::FlowGraph;
pub use node::{FlowNode, NodeAction, NodeKind};
