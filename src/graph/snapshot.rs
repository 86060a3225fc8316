//! The full `{nodes, edges}` payload returned by a graph load

use super::edge::Edge;
use super::node::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A full graph snapshot as returned by the gateway
///
/// Authoritative only at the instant it is received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node_ids(&self) -> HashSet<&NodeId> {
        self.nodes.iter().map(|n| &n.id).collect()
    }

    /// Edges whose source or target is not among the snapshot's nodes
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let ids = self.node_ids();
        self.edges
            .iter()
            .filter(|e| !ids.contains(&e.source) || !ids.contains(&e.target))
            .collect()
    }
}
