//! Events the artifact session publishes

use super::state::EditorMode;
use crate::graph::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoadStarted { node_id: NodeId },
    Opened { node_id: NodeId },
    /// The load failed; whatever was open stays open
    LoadFailed { node_id: NodeId, error: String },
    /// A response arrived for an open that was already superseded
    StaleResponseDiscarded { node_id: NodeId },
    ContentChanged,
    ModeChanged { mode: EditorMode },
    SaveStarted { node_id: NodeId },
    Saved { node_id: NodeId },
    SaveFailed { node_id: NodeId, error: String },
    Reset,
}
