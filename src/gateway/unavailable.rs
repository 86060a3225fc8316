//! Gateway used when the native bridge is missing
//!
//! Every call fails immediately with `GatewayError::Unavailable`, so callers
//! see an ordinary, catchable failure instead of a hang.

use super::traits::{Gateway, GatewayError, GatewayResult, SearchMode, SearchResult};
use crate::graph::{GraphSnapshot, Node, NodeId, NodeType};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct UnavailableGateway {
    reason: String,
}

impl UnavailableGateway {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn refuse<T>(&self, op: &str) -> GatewayResult<T> {
        tracing::warn!(op, reason = %self.reason, "skipping gateway call");
        Err(GatewayError::Unavailable(self.reason.clone()))
    }
}

impl Default for UnavailableGateway {
    fn default() -> Self {
        Self::new("native bridge not detected")
    }
}

#[async_trait]
impl Gateway for UnavailableGateway {
    async fn create_node(&self, _title: &str, _node_type: NodeType) -> GatewayResult<Node> {
        self.refuse("create_node")
    }

    async fn get_node(&self, _id: &NodeId) -> GatewayResult<Node> {
        self.refuse("get_node")
    }

    async fn save_node_content(&self, _id: &NodeId, _content: &str) -> GatewayResult<()> {
        self.refuse("save_node_content")
    }

    async fn load_node_content(&self, _id: &NodeId) -> GatewayResult<String> {
        self.refuse("load_node_content")
    }

    async fn delete_node(&self, _id: &NodeId) -> GatewayResult<()> {
        self.refuse("delete_node")
    }

    async fn update_node_position(&self, _id: &NodeId, _x: f64, _y: f64) -> GatewayResult<()> {
        self.refuse("update_node_position")
    }

    async fn connect_nodes(
        &self,
        _source: &NodeId,
        _target: &NodeId,
        _label: Option<&str>,
    ) -> GatewayResult<()> {
        self.refuse("connect_nodes")
    }

    async fn disconnect_nodes(&self, _source: &NodeId, _target: &NodeId) -> GatewayResult<()> {
        self.refuse("disconnect_nodes")
    }

    async fn get_graph_data(&self) -> GatewayResult<GraphSnapshot> {
        self.refuse("get_graph_data")
    }

    async fn search_nodes(&self, _query: &str, _mode: SearchMode) -> GatewayResult<Vec<SearchResult>> {
        self.refuse("search_nodes")
    }
}
