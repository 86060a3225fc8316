//! Observable state of the artifact editing session

use crate::graph::{Node, NodeId};
use serde::{Deserialize, Serialize};

/// Whether the buffer is shown for editing or rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Edit,
    Preview,
}

impl EditorMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Edit => Self::Preview,
            Self::Preview => Self::Edit,
        }
    }
}

impl std::fmt::Display for EditorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Edit => f.write_str("edit"),
            Self::Preview => f.write_str("preview"),
        }
    }
}

/// Coarse lifecycle phase derived from `SessionState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing open
    Empty,
    Loading,
    Ready { dirty: bool },
    Saving,
}

/// A copy of the session as observers see it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// The open artifact; kept through failed loads and saves
    pub active_node: Option<Node>,
    /// Editing buffer, authoritative while the session holds it
    pub content: String,
    /// The buffer has changed since it last matched persisted content
    pub is_dirty: bool,
    pub mode: EditorMode,
    pub is_loading: bool,
    pub is_saving: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn active_id(&self) -> Option<&NodeId> {
        self.active_node.as_ref().map(|n| &n.id)
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_loading {
            SessionPhase::Loading
        } else if self.is_saving {
            SessionPhase::Saving
        } else if self.active_node.is_some() {
            SessionPhase::Ready {
                dirty: self.is_dirty,
            }
        } else {
            SessionPhase::Empty
        }
    }
}

/// How an `open_artifact` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// The artifact is now the active one
    Opened,
    /// A later open (or a reset) was issued first; this response was dropped
    Superseded,
    /// The gateway failed; the previous artifact stays open
    Failed(String),
}

/// How a `save_content` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved,
    /// Nothing is open, so nothing was sent
    NoActiveArtifact,
    /// The gateway failed; the buffer is kept and stays dirty
    Failed(String),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}
