//! Events the board publishes to its subscribers

use crate::graph::{EdgeId, NodeId};

/// A change in board state, local or gateway-driven.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A snapshot replaced the board
    Loaded { node_count: usize, edge_count: usize },
    /// A load failed; the previous board is untouched
    LoadFailed { error: String },
    /// An interaction delta was applied
    DeltaApplied {
        nodes_applied: usize,
        edges_applied: usize,
        rejected: usize,
    },
    NodeCreated { node_id: NodeId },
    /// A node left the board, taking these edges with it
    NodeRemoved {
        node_id: NodeId,
        edge_ids: Vec<EdgeId>,
    },
    /// An edge appeared locally, pending gateway acknowledgement
    EdgeAdded { edge_id: EdgeId },
    EdgeConfirmed { edge_id: EdgeId },
    /// The gateway rejected an edge; it stays on the board marked failed
    EdgeFailed { edge_id: EdgeId, error: String },
    EdgesRemoved { edge_ids: Vec<EdgeId> },
    PositionCommitted { node_id: NodeId },
    /// The position stays local; backend diverges until the next load
    PositionPersistFailed { node_id: NodeId, error: String },
    /// A background call for `op` failed
    SyncFailed { op: &'static str, error: String },
}
