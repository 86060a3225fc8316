//! In-process gateway backed by concurrent maps
//!
//! Behaves like the SQLite gateway (same dedup and default-label rules) but
//! keeps everything in memory. Carries fault-injection hooks so callers can
//! script failures and hold calls in flight.

use super::lexical::{self, Candidate};
use super::traits::{Gateway, GatewayError, GatewayResult, SearchMode, SearchResult};
use crate::graph::{
    Edge, EdgeId, GraphSnapshot, Node, NodeId, NodeType, PropertyValue, META_X, META_Y,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::watch;

/// Label the gateway stores when a connect call carries none
pub const DEFAULT_EDGE_LABEL: &str = "related";

/// Identifies a gateway operation for fault injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    CreateNode,
    GetNode,
    SaveNodeContent,
    LoadNodeContent,
    DeleteNode,
    UpdateNodePosition,
    ConnectNodes,
    DisconnectNodes,
    GetGraphData,
    SearchNodes,
}

#[derive(Debug)]
struct StoredNode {
    node: Node,
    content: String,
}

struct Hold {
    op: GatewayOp,
    key: Option<String>,
    /// Catches only the next matching call
    once: bool,
    release: watch::Receiver<bool>,
}

impl Hold {
    fn matches(&self, op: GatewayOp, key: Option<&str>) -> bool {
        self.op == op && self.key.as_deref().map_or(true, |k| Some(k) == key)
    }

    /// Released, or its handle is gone
    fn is_spent(&self) -> bool {
        *self.release.borrow() || self.release.has_changed().is_err()
    }
}

#[derive(Default)]
struct Faults {
    calls: HashMap<GatewayOp, usize>,
    fail_next: HashMap<GatewayOp, VecDeque<String>>,
    failing: HashMap<GatewayOp, String>,
    holds: Vec<Hold>,
}

/// Keeps held calls suspended until released (or until the handle is dropped)
pub struct HoldHandle {
    release: watch::Sender<bool>,
}

impl HoldHandle {
    /// Let every call held by this handle proceed
    pub fn release(&self) {
        let _ = self.release.send(true);
    }
}

/// In-memory gateway
#[derive(Default)]
pub struct MemoryGateway {
    nodes: DashMap<NodeId, StoredNode>,
    edges: Mutex<Vec<Edge>>,
    faults: Mutex<Faults>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Seeding ---

    /// Insert a node as-is, bypassing fault injection
    pub fn insert_node(&self, node: Node) {
        self.nodes.insert(
            node.id.clone(),
            StoredNode {
                node,
                content: String::new(),
            },
        );
    }

    /// Insert a node together with persisted content
    pub fn insert_node_with_content(&self, mut node: Node, content: impl Into<String>) {
        node.content_path = format!("{}.md", node.id);
        self.nodes.insert(
            node.id.clone(),
            StoredNode {
                node,
                content: content.into(),
            },
        );
    }

    /// Insert an edge as-is
    pub fn insert_edge(&self, edge: Edge) {
        self.edges.lock().unwrap().push(edge);
    }

    // --- Inspection ---

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().unwrap().len()
    }

    pub fn stored_content(&self, id: &NodeId) -> Option<String> {
        self.nodes.get(id).map(|n| n.content.clone())
    }

    pub fn stored_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).map(|n| n.node.clone())
    }

    pub fn stored_edges(&self) -> Vec<Edge> {
        self.edges.lock().unwrap().clone()
    }

    /// How many times `op` has been invoked
    pub fn calls(&self, op: GatewayOp) -> usize {
        self.faults.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    /// Holds still registered; spent ones are dropped on the next call
    pub fn registered_holds(&self) -> usize {
        self.faults.lock().unwrap().holds.len()
    }

    // --- Fault injection ---

    /// Make the next call of `op` fail with `reason`
    pub fn fail_next(&self, op: GatewayOp, reason: impl Into<String>) {
        self.faults
            .lock()
            .unwrap()
            .fail_next
            .entry(op)
            .or_default()
            .push_back(reason.into());
    }

    /// Make every call of `op` fail until `recover` is called
    pub fn fail_always(&self, op: GatewayOp, reason: impl Into<String>) {
        self.faults.lock().unwrap().failing.insert(op, reason.into());
    }

    pub fn recover(&self, op: GatewayOp) {
        self.faults.lock().unwrap().failing.remove(&op);
    }

    /// Suspend calls of `op` until the returned handle is released.
    ///
    /// With `key` set, only calls addressing that node id are held.
    pub fn hold(&self, op: GatewayOp, key: Option<&str>) -> HoldHandle {
        self.register_hold(op, key, false)
    }

    /// Like `hold`, but only the next matching call is suspended
    pub fn hold_once(&self, op: GatewayOp, key: Option<&str>) -> HoldHandle {
        self.register_hold(op, key, true)
    }

    fn register_hold(&self, op: GatewayOp, key: Option<&str>, once: bool) -> HoldHandle {
        let (tx, rx) = watch::channel(false);
        self.faults.lock().unwrap().holds.push(Hold {
            op,
            key: key.map(str::to_string),
            once,
            release: rx,
        });
        HoldHandle { release: tx }
    }

    /// Count the call, wait out any matching hold, then apply scripted faults
    async fn enter(&self, op: GatewayOp, key: Option<&str>) -> GatewayResult<()> {
        let (fault, holds) = {
            let mut faults = self.faults.lock().unwrap();
            *faults.calls.entry(op).or_default() += 1;
            let mut holds: Vec<watch::Receiver<bool>> = Vec::new();
            faults.holds.retain(|h| {
                if h.is_spent() {
                    return false;
                }
                if !h.matches(op, key) {
                    return true;
                }
                holds.push(h.release.clone());
                !h.once
            });
            let fault = faults
                .fail_next
                .get_mut(&op)
                .and_then(|q| q.pop_front())
                .or_else(|| faults.failing.get(&op).cloned());
            (fault, holds)
        };

        for mut release in holds {
            while !*release.borrow() {
                if release.changed().await.is_err() {
                    break;
                }
            }
        }

        match fault {
            Some(reason) => Err(GatewayError::Rejected(reason)),
            None => Ok(()),
        }
    }

    fn require(&self, id: &NodeId) -> GatewayResult<()> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(GatewayError::NotFound(id.clone()))
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn create_node(&self, title: &str, node_type: NodeType) -> GatewayResult<Node> {
        self.enter(GatewayOp::CreateNode, None).await?;
        let node = Node::new(NodeId::generate(), node_type, title);
        self.insert_node(node.clone());
        Ok(node)
    }

    async fn get_node(&self, id: &NodeId) -> GatewayResult<Node> {
        self.enter(GatewayOp::GetNode, Some(id.as_str())).await?;
        self.nodes
            .get(id)
            .map(|n| n.node.clone())
            .ok_or_else(|| GatewayError::NotFound(id.clone()))
    }

    async fn save_node_content(&self, id: &NodeId, content: &str) -> GatewayResult<()> {
        self.enter(GatewayOp::SaveNodeContent, Some(id.as_str())).await?;
        let mut stored = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        stored.content = content.to_string();
        stored.node.content_path = format!("{}.md", id);
        stored.node.updated_at = Utc::now();
        Ok(())
    }

    async fn load_node_content(&self, id: &NodeId) -> GatewayResult<String> {
        self.enter(GatewayOp::LoadNodeContent, Some(id.as_str())).await?;
        self.nodes
            .get(id)
            .map(|n| n.content.clone())
            .ok_or_else(|| GatewayError::NotFound(id.clone()))
    }

    async fn delete_node(&self, id: &NodeId) -> GatewayResult<()> {
        self.enter(GatewayOp::DeleteNode, Some(id.as_str())).await?;
        self.nodes.remove(id);
        self.edges.lock().unwrap().retain(|e| !e.touches(id));
        Ok(())
    }

    async fn update_node_position(&self, id: &NodeId, x: f64, y: f64) -> GatewayResult<()> {
        self.enter(GatewayOp::UpdateNodePosition, Some(id.as_str()))
            .await?;
        let mut stored = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        stored.node.metadata.insert(META_X.to_string(), PropertyValue::Float(x));
        stored.node.metadata.insert(META_Y.to_string(), PropertyValue::Float(y));
        stored.node.updated_at = Utc::now();
        Ok(())
    }

    async fn connect_nodes(
        &self,
        source: &NodeId,
        target: &NodeId,
        label: Option<&str>,
    ) -> GatewayResult<()> {
        self.enter(GatewayOp::ConnectNodes, Some(source.as_str()))
            .await?;
        self.require(source)?;
        self.require(target)?;

        let mut edges = self.edges.lock().unwrap();
        if edges.iter().any(|e| e.connects(source, target)) {
            return Ok(());
        }
        edges.push(
            Edge::new(EdgeId::generate(), source.clone(), target.clone())
                .with_label(label.unwrap_or(DEFAULT_EDGE_LABEL)),
        );
        Ok(())
    }

    async fn disconnect_nodes(&self, source: &NodeId, target: &NodeId) -> GatewayResult<()> {
        self.enter(GatewayOp::DisconnectNodes, Some(source.as_str()))
            .await?;
        self.edges
            .lock()
            .unwrap()
            .retain(|e| !e.connects(source, target));
        Ok(())
    }

    async fn get_graph_data(&self) -> GatewayResult<GraphSnapshot> {
        self.enter(GatewayOp::GetGraphData, None).await?;
        let mut nodes: Vec<Node> = self.nodes.iter().map(|n| n.node.clone()).collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let edges = self.edges.lock().unwrap().clone();
        Ok(GraphSnapshot::new(nodes, edges))
    }

    async fn search_nodes(&self, query: &str, mode: SearchMode) -> GatewayResult<Vec<SearchResult>> {
        self.enter(GatewayOp::SearchNodes, None).await?;
        let stored: Vec<(NodeId, String, String)> = self
            .nodes
            .iter()
            .map(|n| (n.node.id.clone(), n.node.title.clone(), n.content.clone()))
            .collect();
        lexical::search(
            query,
            mode,
            stored.iter().map(|(id, title, content)| Candidate {
                id,
                title,
                content,
            }),
        )
    }
}
