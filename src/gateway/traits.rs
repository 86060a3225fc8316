//! Gateway trait definitions

use crate::graph::{GraphSnapshot, Node, NodeId, NodeType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a gateway call can fail with
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The native bridge the gateway depends on is not present
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// The remote side refused or failed the call
    #[error("gateway call failed: {0}")]
    Rejected(String),

    #[error("unsupported search mode: {0}")]
    UnsupportedMode(SearchMode),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking storage task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for gateway calls
pub type GatewayResult<T> = Result<T, GatewayError>;

/// How `search_nodes` matches a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Lexical match on title and content
    Fuzzy,
    /// Embedding similarity
    Semantic,
    /// Both, merged by score
    #[default]
    Hybrid,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fuzzy" => Ok(Self::Fuzzy),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown search mode: {}", other)),
        }
    }
}

/// A single search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: NodeId,
    pub title: String,
    /// Higher is better
    pub score: f32,
    pub snippet: String,
}

/// The sole channel to persistent storage
///
/// Every call is asynchronous and may fail independently of the others.
/// Implementations must fail immediately (never hang) when their backing
/// environment is missing.
#[async_trait]
pub trait Gateway: Send + Sync {
    // === Nodes ===

    /// Create a node; the gateway assigns its id
    async fn create_node(&self, title: &str, node_type: NodeType) -> GatewayResult<Node>;

    /// Fetch node metadata; `NotFound` if absent
    async fn get_node(&self, id: &NodeId) -> GatewayResult<Node>;

    /// Overwrite the node's persisted content
    async fn save_node_content(&self, id: &NodeId, content: &str) -> GatewayResult<()>;

    /// Read the node's persisted content; empty if it was never saved
    async fn load_node_content(&self, id: &NodeId) -> GatewayResult<String>;

    /// Delete a node and its incident edges
    async fn delete_node(&self, id: &NodeId) -> GatewayResult<()>;

    /// Persist the layout hint into the node's metadata
    async fn update_node_position(&self, id: &NodeId, x: f64, y: f64) -> GatewayResult<()>;

    // === Edges ===

    /// Connect two nodes; the gateway assigns the edge id
    async fn connect_nodes(
        &self,
        source: &NodeId,
        target: &NodeId,
        label: Option<&str>,
    ) -> GatewayResult<()>;

    /// Remove every edge running from `source` to `target`
    async fn disconnect_nodes(&self, source: &NodeId, target: &NodeId) -> GatewayResult<()>;

    // === Bulk ===

    /// One-shot fetch of the full graph
    async fn get_graph_data(&self) -> GatewayResult<GraphSnapshot>;

    async fn search_nodes(&self, query: &str, mode: SearchMode) -> GatewayResult<Vec<SearchResult>>;
}
