//! Edge representation and local sync status

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// Prefix carried by ids the client synthesizes before the gateway acknowledges
const PROVISIONAL_PREFIX: &str = "local:";

/// Unique identifier for an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    /// Create an EdgeId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A new random id, as a gateway assigns them
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// A client-side id for an edge the gateway has not assigned yet
    pub fn provisional() -> Self {
        Self(format!("{}{}", PROVISIONAL_PREFIX, uuid::Uuid::new_v4()))
    }

    /// True if this id was synthesized locally
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A directed, optionally labeled edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// True if the edge touches the given node at either end
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }

    /// True if the edge runs from `source` to `target`
    pub fn connects(&self, source: &NodeId, target: &NodeId) -> bool {
        &self.source == source && &self.target == target
    }
}

/// Where a locally held edge stands relative to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum EdgeStatus {
    /// Created locally, gateway call in flight
    Pending,
    /// Acknowledged by the gateway, or received in a snapshot
    Confirmed,
    /// The gateway rejected it; kept visible so the user can retry or discard
    Failed(String),
}

impl EdgeStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
