//! Core graph data structures shared by the gateway, the board and the session

mod edge;
mod node;
mod snapshot;

#[cfg(test)]
mod tests;

pub use edge::{Edge, EdgeId, EdgeStatus};
pub use node::{Metadata, Node, NodeId, NodeType, PropertyValue, META_X, META_Y};
pub use snapshot::GraphSnapshot;
