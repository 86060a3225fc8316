//! Interaction deltas: transient, local-only edits from direct manipulation
//!
//! A delta never reaches the gateway. Each change is applied independently;
//! changes that would break the edge invariant are rejected and reported,
//! the rest apply.

use super::layout::Position;
use crate::graph::{Edge, EdgeId, Node, NodeId};

/// A structural change to a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    /// Put a node on the board; an existing node with the same id is replaced
    Add {
        node: Node,
        position: Option<Position>,
    },
    /// Take a node off the board together with its incident edges
    Remove { id: NodeId },
    /// Move a node; `dragging` is true while the gesture is in progress
    Move {
        id: NodeId,
        position: Position,
        dragging: bool,
    },
    Select { id: NodeId, selected: bool },
}

/// A structural change to an edge
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeChange {
    Add(Edge),
    Remove { id: EdgeId },
    Select { id: EdgeId, selected: bool },
}

/// A batch of changes produced by one gesture
///
/// Node changes apply before edge changes, so a batch may add a node and an
/// edge to it together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionDelta {
    pub nodes: Vec<NodeChange>,
    pub edges: Vec<EdgeChange>,
}

impl InteractionDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, change: NodeChange) -> Self {
        self.nodes.push(change);
        self
    }

    pub fn with_edge(mut self, change: EdgeChange) -> Self {
        self.edges.push(change);
        self
    }

    /// Single drag step
    pub fn drag(id: impl Into<NodeId>, x: f64, y: f64) -> Self {
        Self::new().with_node(NodeChange::Move {
            id: id.into(),
            position: Position::new(x, y),
            dragging: true,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Why a change in a delta was not applied
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// Edge references a node that is not on the board
    MissingEndpoint(NodeId),
    UnknownNode(NodeId),
    UnknownEdge(EdgeId),
    /// Position with NaN or infinite coordinates
    InvalidPosition,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEndpoint(id) => write!(f, "missing endpoint {}", id),
            Self::UnknownNode(id) => write!(f, "unknown node {}", id),
            Self::UnknownEdge(id) => write!(f, "unknown edge {}", id),
            Self::InvalidPosition => write!(f, "position is not finite"),
        }
    }
}

/// A single rejected change
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub description: String,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn new(description: impl Into<String>, reason: RejectionReason) -> Self {
        Self {
            description: description.into(),
            reason,
        }
    }
}

/// What applying a delta did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaReport {
    pub nodes_applied: usize,
    pub edges_applied: usize,
    /// Edges dropped because a node they touched was removed
    pub edges_cascaded: Vec<EdgeId>,
    pub rejections: Vec<Rejection>,
}

impl DeltaReport {
    /// True if every change applied
    pub fn is_fully_applied(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.nodes_applied == 0
            && self.edges_applied == 0
            && self.edges_cascaded.is_empty()
            && self.rejections.is_empty()
    }
}
