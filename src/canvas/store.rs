//! GraphStore: the client-resident board
//!
//! Local state always changes first. Gateway calls for committed operations
//! run as background tasks; their outcomes come back as status changes and
//! events, never as a blocked caller.

use super::delta::{
    DeltaReport, EdgeChange, InteractionDelta, NodeChange, Rejection, RejectionReason,
};
use super::events::GraphEvent;
use super::layout::{Placement, Position};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{Gateway, GatewayResult};
use crate::graph::{Edge, EdgeId, EdgeStatus, GraphSnapshot, Node, NodeId, NodeType};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A node as placed on the board
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasNode {
    pub node: Node,
    pub position: Position,
    /// A drag gesture is in progress
    pub dragging: bool,
    pub selected: bool,
}

impl CanvasNode {
    pub fn new(node: Node, position: Position) -> Self {
        Self {
            node,
            position,
            dragging: false,
            selected: false,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }
}

/// An edge as held on the board, with its sync status
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasEdge {
    pub edge: Edge,
    pub status: EdgeStatus,
    pub selected: bool,
}

impl CanvasEdge {
    fn with_status(edge: Edge, status: EdgeStatus) -> Self {
        Self {
            edge,
            status,
            selected: false,
        }
    }

    pub fn id(&self) -> &EdgeId {
        &self.edge.id
    }
}

/// Everything the board holds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasState {
    pub nodes: Vec<CanvasNode>,
    pub edges: Vec<CanvasEdge>,
    /// Last failure surfaced to the user
    pub error: Option<String>,
    pub is_loading: bool,
}

impl CanvasState {
    pub fn node(&self, id: &NodeId) -> Option<&CanvasNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    fn node_mut(&mut self, id: &NodeId) -> Option<&mut CanvasNode> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&CanvasEdge> {
        self.edges.iter().find(|e| e.id() == id)
    }

    fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut CanvasEdge> {
        self.edges.iter_mut().find(|e| e.id() == id)
    }

    /// Edges running from `source` to `target`
    pub fn edges_between(&self, source: &NodeId, target: &NodeId) -> Vec<&CanvasEdge> {
        self.edges
            .iter()
            .filter(|e| e.edge.connects(source, target))
            .collect()
    }

    /// Insert or replace a node, keeping its slot when replacing
    fn upsert_node(&mut self, node: CanvasNode) {
        match self.node_mut(node.id()) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    /// Remove a node and every edge touching it; returns the removed edge ids
    fn remove_node(&mut self, id: &NodeId) -> Option<Vec<EdgeId>> {
        let idx = self.nodes.iter().position(|n| n.id() == id)?;
        self.nodes.remove(idx);
        let mut removed = Vec::new();
        self.edges.retain(|e| {
            if e.edge.touches(id) {
                removed.push(e.edge.id.clone());
                false
            } else {
                true
            }
        });
        Some(removed)
    }
}

/// State shared with background gateway tasks
struct Shared {
    state: Mutex<CanvasState>,
    events: broadcast::Sender<GraphEvent>,
}

impl Shared {
    fn notify(&self, event: GraphEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn record_error(&self, error: &str) {
        self.state.lock().unwrap().error = Some(error.to_string());
    }

    /// Apply the gateway's verdict on a connect call
    fn settle_edge(&self, edge_id: &EdgeId, result: GatewayResult<()>) {
        let status = match &result {
            Ok(()) => EdgeStatus::Confirmed,
            Err(e) => EdgeStatus::Failed(e.to_string()),
        };

        {
            let mut state = self.state.lock().unwrap();
            match state.edge_mut(edge_id) {
                Some(edge) => edge.status = status,
                None => {
                    // Replaced by a reload or removed meanwhile
                    debug!(edge = %edge_id, "connect settled for an edge no longer on the board");
                    return;
                }
            }
            if let Err(e) = &result {
                state.error = Some(format!("failed to connect nodes: {}", e));
            }
        }

        match result {
            Ok(()) => self.notify(GraphEvent::EdgeConfirmed {
                edge_id: edge_id.clone(),
            }),
            Err(e) => {
                warn!(edge = %edge_id, error = %e, "connect failed; edge marked failed");
                self.notify(GraphEvent::EdgeFailed {
                    edge_id: edge_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}

/// The client-resident board
///
/// Owns the node/edge working set and layout. Explicitly constructed around
/// an injected gateway; observers subscribe to `GraphEvent`s. Background
/// calls need a Tokio runtime.
pub struct GraphStore {
    gateway: Arc<dyn Gateway>,
    shared: Arc<Shared>,
    placement: Placement,
    default_label: String,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    /// Bumped per `load_graph`; only the latest load may land
    load_generation: AtomicU64,
}

impl GraphStore {
    /// Create a board with default configuration
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_config(gateway, &Config::default())
    }

    pub fn with_config(gateway: Arc<dyn Gateway>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            gateway,
            shared: Arc::new(Shared {
                state: Mutex::new(CanvasState::default()),
                events,
            }),
            placement: Placement::from_config(&config.layout),
            default_label: config.default_edge_label.clone(),
            in_flight: Mutex::new(Vec::new()),
            load_generation: AtomicU64::new(0),
        }
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.shared.events.subscribe()
    }

    // --- Reads ---

    /// A copy of the whole board
    pub fn snapshot(&self) -> CanvasState {
        self.shared.state.lock().unwrap().clone()
    }

    pub fn nodes(&self) -> Vec<CanvasNode> {
        self.shared.state.lock().unwrap().nodes.clone()
    }

    pub fn edges(&self) -> Vec<CanvasEdge> {
        self.shared.state.lock().unwrap().edges.clone()
    }

    pub fn node(&self, id: &NodeId) -> Option<CanvasNode> {
        self.shared.state.lock().unwrap().node(id).cloned()
    }

    pub fn edge(&self, id: &EdgeId) -> Option<CanvasEdge> {
        self.shared.state.lock().unwrap().edge(id).cloned()
    }

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.shared.state.lock().unwrap().has_node(id)
    }

    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.shared
            .state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .filter(|n| n.selected)
            .map(|n| n.id().clone())
            .collect()
    }

    pub fn error(&self) -> Option<String> {
        self.shared.state.lock().unwrap().error.clone()
    }

    pub fn clear_error(&self) {
        self.shared.state.lock().unwrap().error = None;
    }

    // --- Load ---

    /// Fetch the full graph and replace the board with it.
    ///
    /// On failure the previous board stays exactly as it was and the error
    /// is surfaced through `error()` and a `LoadFailed` event. When loads
    /// overlap, only the most recently issued one is applied; `is_loading`
    /// stays set until it returns.
    pub async fn load_graph(&self) {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state.lock().unwrap().is_loading = true;

        let result = self.gateway.get_graph_data().await;
        if self.load_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "graph load superseded by a later load; result dropped");
            return;
        }

        match result {
            Ok(snapshot) => {
                let (nodes, edges) = self.materialize(snapshot);
                let (node_count, edge_count) = (nodes.len(), edges.len());
                {
                    let mut state = self.shared.state.lock().unwrap();
                    state.nodes = nodes;
                    state.edges = edges;
                    state.error = None;
                    state.is_loading = false;
                }
                info!(nodes = node_count, edges = edge_count, "graph loaded");
                self.shared.notify(GraphEvent::Loaded {
                    node_count,
                    edge_count,
                });
            }
            Err(e) => {
                {
                    let mut state = self.shared.state.lock().unwrap();
                    state.is_loading = false;
                    state.error = Some(format!("failed to load graph: {}", e));
                }
                warn!(error = %e, "graph load failed; keeping previous board");
                self.shared.notify(GraphEvent::LoadFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Turn a snapshot into board entries, dropping edges that would dangle
    fn materialize(&self, snapshot: GraphSnapshot) -> (Vec<CanvasNode>, Vec<CanvasEdge>) {
        for edge in snapshot.dangling_edges() {
            warn!(edge = %edge.id, source = %edge.source, target = %edge.target,
                "snapshot edge references a missing node; skipped");
        }
        let ids: std::collections::HashSet<NodeId> =
            snapshot.nodes.iter().map(|n| n.id.clone()).collect();

        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|node| {
                let position = self.placement.initial_position(&node);
                CanvasNode::new(node, position)
            })
            .collect();
        let edges = snapshot
            .edges
            .into_iter()
            .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
            .map(|e| CanvasEdge::with_status(e, EdgeStatus::Confirmed))
            .collect();
        (nodes, edges)
    }

    // --- Local-only deltas ---

    /// Apply a batch of direct-manipulation changes synchronously.
    ///
    /// Never calls the gateway. Edge additions whose endpoints are not on
    /// the board are rejected; everything else applies.
    pub fn apply_interaction_delta(&self, delta: InteractionDelta) -> DeltaReport {
        let mut report = DeltaReport::default();
        if delta.is_empty() {
            return report;
        }

        {
            let mut state = self.shared.state.lock().unwrap();
            for change in delta.nodes {
                self.apply_node_change(&mut state, change, &mut report);
            }
            for change in delta.edges {
                Self::apply_edge_change(&mut state, change, &mut report);
            }
        }

        if !report.rejections.is_empty() {
            debug!(rejected = report.rejections.len(), "interaction delta partially applied");
        }
        self.shared.notify(GraphEvent::DeltaApplied {
            nodes_applied: report.nodes_applied,
            edges_applied: report.edges_applied,
            rejected: report.rejections.len(),
        });
        report
    }

    fn apply_node_change(
        &self,
        state: &mut CanvasState,
        change: NodeChange,
        report: &mut DeltaReport,
    ) {
        match change {
            NodeChange::Add { node, position } => {
                let position = position.unwrap_or_else(|| self.placement.initial_position(&node));
                if !position.is_finite() {
                    report.rejections.push(Rejection::new(
                        format!("add node {}", node.id),
                        RejectionReason::InvalidPosition,
                    ));
                    return;
                }
                state.upsert_node(CanvasNode::new(node, position));
                report.nodes_applied += 1;
            }
            NodeChange::Remove { id } => match state.remove_node(&id) {
                Some(cascaded) => {
                    report.nodes_applied += 1;
                    report.edges_cascaded.extend(cascaded);
                }
                None => report.rejections.push(Rejection::new(
                    format!("remove node {}", id),
                    RejectionReason::UnknownNode(id),
                )),
            },
            NodeChange::Move {
                id,
                position,
                dragging,
            } => {
                if !position.is_finite() {
                    report.rejections.push(Rejection::new(
                        format!("move node {}", id),
                        RejectionReason::InvalidPosition,
                    ));
                    return;
                }
                match state.node_mut(&id) {
                    Some(node) => {
                        node.position = position;
                        node.dragging = dragging;
                        report.nodes_applied += 1;
                    }
                    None => report.rejections.push(Rejection::new(
                        format!("move node {}", id),
                        RejectionReason::UnknownNode(id),
                    )),
                }
            }
            NodeChange::Select { id, selected } => match state.node_mut(&id) {
                Some(node) => {
                    node.selected = selected;
                    report.nodes_applied += 1;
                }
                None => report.rejections.push(Rejection::new(
                    format!("select node {}", id),
                    RejectionReason::UnknownNode(id),
                )),
            },
        }
    }

    fn apply_edge_change(state: &mut CanvasState, change: EdgeChange, report: &mut DeltaReport) {
        match change {
            EdgeChange::Add(edge) => {
                let missing = [&edge.source, &edge.target]
                    .into_iter()
                    .find(|id| !state.has_node(id))
                    .cloned();
                if let Some(missing) = missing {
                    report.rejections.push(Rejection::new(
                        format!("edge {}→{}", edge.source, edge.target),
                        RejectionReason::MissingEndpoint(missing),
                    ));
                    return;
                }
                // Local-only edges have not been through the gateway
                let status = if edge.id.is_provisional() {
                    EdgeStatus::Pending
                } else {
                    EdgeStatus::Confirmed
                };
                match state.edge_mut(&edge.id) {
                    Some(existing) => existing.edge = edge,
                    None => state.edges.push(CanvasEdge::with_status(edge, status)),
                }
                report.edges_applied += 1;
            }
            EdgeChange::Remove { id } => {
                let before = state.edges.len();
                state.edges.retain(|e| e.id() != &id);
                if state.edges.len() < before {
                    report.edges_applied += 1;
                } else {
                    report.rejections.push(Rejection::new(
                        format!("remove edge {}", id),
                        RejectionReason::UnknownEdge(id),
                    ));
                }
            }
            EdgeChange::Select { id, selected } => match state.edge_mut(&id) {
                Some(edge) => {
                    edge.selected = selected;
                    report.edges_applied += 1;
                }
                None => report.rejections.push(Rejection::new(
                    format!("select edge {}", id),
                    RejectionReason::UnknownEdge(id),
                )),
            },
        }
    }

    // --- Committed operations ---

    /// Connect two nodes on the board.
    ///
    /// Both ids must be on the board, else `SyncError::Validation` and
    /// nothing changes. The edge appears immediately as `Pending` under a
    /// provisional id; the gateway call runs in the background and flips it
    /// to `Confirmed` or `Failed`. An existing live edge for the same pair is
    /// returned as-is; a failed one is retried, taking `label` if one is given.
    pub fn connect(&self, source: &NodeId, target: &NodeId, label: Option<&str>) -> SyncResult<EdgeId> {
        let requested = label;
        let label = requested.unwrap_or(self.default_label.as_str()).to_string();

        let edge = {
            let mut state = self.shared.state.lock().unwrap();
            for id in [source, target] {
                if !state.has_node(id) {
                    return Err(SyncError::Validation(format!(
                        "cannot connect {} to {}: node {} is not on the board",
                        source, target, id
                    )));
                }
            }

            let existing = state
                .edges
                .iter()
                .find(|e| e.edge.connects(source, target))
                .map(|e| (e.edge.id.clone(), e.status.is_failed()));
            match existing {
                Some((id, false)) => return Ok(id),
                Some((id, true)) => {
                    if let (Some(relabel), Some(entry)) = (requested, state.edge_mut(&id)) {
                        entry.edge.label = Some(relabel.to_string());
                    }
                    drop(state);
                    self.retry_edge(&id)?;
                    return Ok(id);
                }
                None => {}
            }

            let edge = Edge::new(EdgeId::provisional(), source.clone(), target.clone())
                .with_label(label);
            state
                .edges
                .push(CanvasEdge::with_status(edge.clone(), EdgeStatus::Pending));
            edge
        };

        self.shared.notify(GraphEvent::EdgeAdded {
            edge_id: edge.id.clone(),
        });
        let id = edge.id.clone();
        self.spawn_connect(edge);
        Ok(id)
    }

    /// Re-issue the connect call for a failed edge
    pub fn retry_edge(&self, id: &EdgeId) -> SyncResult<()> {
        let edge = {
            let mut state = self.shared.state.lock().unwrap();
            let entry = state
                .edge_mut(id)
                .ok_or_else(|| SyncError::Validation(format!("edge {} is not on the board", id)))?;
            if !entry.status.is_failed() {
                return Err(SyncError::Validation(format!("edge {} has not failed", id)));
            }
            entry.status = EdgeStatus::Pending;
            entry.edge.clone()
        };

        debug!(edge = %id, "retrying connect");
        self.shared.notify(GraphEvent::EdgeAdded {
            edge_id: id.clone(),
        });
        self.spawn_connect(edge);
        Ok(())
    }

    /// Drop a failed edge from the board
    pub fn discard_edge(&self, id: &EdgeId) -> SyncResult<()> {
        {
            let mut state = self.shared.state.lock().unwrap();
            let failed = state
                .edge(id)
                .map(|e| e.status.is_failed())
                .ok_or_else(|| SyncError::Validation(format!("edge {} is not on the board", id)))?;
            if !failed {
                return Err(SyncError::Validation(format!(
                    "edge {} has not failed; disconnect it instead",
                    id
                )));
            }
            state.edges.retain(|e| e.id() != id);
        }
        self.shared.notify(GraphEvent::EdgesRemoved {
            edge_ids: vec![id.clone()],
        });
        Ok(())
    }

    fn spawn_connect(&self, edge: Edge) {
        let gateway = self.gateway.clone();
        let shared = self.shared.clone();
        self.spawn_sync(async move {
            let result = gateway
                .connect_nodes(&edge.source, &edge.target, edge.label.as_deref())
                .await;
            shared.settle_edge(&edge.id, result);
        });
    }

    /// Remove every edge from `source` to `target`, locally first
    pub fn disconnect(&self, source: &NodeId, target: &NodeId) -> SyncResult<Vec<EdgeId>> {
        let removed: Vec<EdgeId> = {
            let mut state = self.shared.state.lock().unwrap();
            for id in [source, target] {
                if !state.has_node(id) {
                    return Err(SyncError::Validation(format!(
                        "cannot disconnect: node {} is not on the board",
                        id
                    )));
                }
            }
            let removed = state
                .edges_between(source, target)
                .into_iter()
                .map(|e| e.edge.id.clone())
                .collect();
            state.edges.retain(|e| !e.edge.connects(source, target));
            removed
        };

        if !removed.is_empty() {
            self.shared.notify(GraphEvent::EdgesRemoved {
                edge_ids: removed.clone(),
            });
        }

        let gateway = self.gateway.clone();
        let shared = self.shared.clone();
        let (source, target) = (source.clone(), target.clone());
        self.spawn_sync(async move {
            if let Err(e) = gateway.disconnect_nodes(&source, &target).await {
                warn!(%source, %target, error = %e, "disconnect failed");
                shared.record_error(&format!("failed to disconnect nodes: {}", e));
                shared.notify(GraphEvent::SyncFailed {
                    op: "disconnect_nodes",
                    error: e.to_string(),
                });
            }
        });
        Ok(removed)
    }

    /// Commit a node's position at the end of a drag.
    ///
    /// The local position is updated and persistence is fire-and-forget:
    /// on failure the board keeps the new position and the backend keeps
    /// the old one until the next successful load.
    pub fn commit_position(&self, id: &NodeId, x: f64, y: f64) -> SyncResult<()> {
        let position = Position::new(x, y);
        if !position.is_finite() {
            return Err(SyncError::Validation(format!(
                "position ({}, {}) for node {} is not finite",
                x, y, id
            )));
        }

        {
            let mut state = self.shared.state.lock().unwrap();
            let node = state.node_mut(id).ok_or_else(|| {
                SyncError::Validation(format!("cannot move node {}: not on the board", id))
            })?;
            node.position = position;
            node.dragging = false;
        }

        let gateway = self.gateway.clone();
        let shared = self.shared.clone();
        let id = id.clone();
        self.spawn_sync(async move {
            match gateway.update_node_position(&id, x, y).await {
                Ok(()) => shared.notify(GraphEvent::PositionCommitted { node_id: id }),
                Err(e) => {
                    warn!(node = %id, error = %e, "position not persisted");
                    shared.record_error(&format!("failed to save position: {}", e));
                    shared.notify(GraphEvent::PositionPersistFailed {
                        node_id: id,
                        error: e.to_string(),
                    });
                }
            }
        });
        Ok(())
    }

    /// Create a node through the gateway and place it on the board.
    ///
    /// The gateway assigns the id, so this waits for it. Returns `None` if
    /// the call failed; the failure is surfaced through `error()`.
    pub async fn create_node(&self, title: &str, node_type: NodeType) -> Option<NodeId> {
        match self.gateway.create_node(title, node_type).await {
            Ok(node) => {
                let id = node.id.clone();
                let position = self.placement.initial_position(&node);
                self.shared
                    .state
                    .lock()
                    .unwrap()
                    .upsert_node(CanvasNode::new(node, position));
                self.shared.notify(GraphEvent::NodeCreated {
                    node_id: id.clone(),
                });
                Some(id)
            }
            Err(e) => {
                warn!(title, error = %e, "create node failed");
                self.shared
                    .record_error(&format!("failed to create node: {}", e));
                self.shared.notify(GraphEvent::SyncFailed {
                    op: "create_node",
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Remove a node and its edges locally, then delete it remotely
    pub fn delete_node(&self, id: &NodeId) -> SyncResult<()> {
        let cascaded = self
            .shared
            .state
            .lock()
            .unwrap()
            .remove_node(id)
            .ok_or_else(|| SyncError::Validation(format!("cannot delete node {}: not on the board", id)))?;

        self.shared.notify(GraphEvent::NodeRemoved {
            node_id: id.clone(),
            edge_ids: cascaded,
        });

        let gateway = self.gateway.clone();
        let shared = self.shared.clone();
        let id = id.clone();
        self.spawn_sync(async move {
            if let Err(e) = gateway.delete_node(&id).await {
                warn!(node = %id, error = %e, "delete failed; reload to restore the node");
                shared.record_error(&format!("failed to delete node: {}", e));
                shared.notify(GraphEvent::SyncFailed {
                    op: "delete_node",
                    error: e.to_string(),
                });
            }
        });
        Ok(())
    }

    // --- Background tasks ---

    fn spawn_sync<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Wait for every background gateway call issued so far
    pub async fn flush(&self) {
        loop {
            let handles = std::mem::take(&mut *self.in_flight.lock().unwrap());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "background gateway task panicked");
                }
            }
        }
    }

    /// Number of background gateway calls still running
    pub fn pending_calls(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayOp, MemoryGateway};
    use crate::graph::PropertyValue;

    fn seeded_gateway() -> Arc<MemoryGateway> {
        let gw = Arc::new(MemoryGateway::new());
        gw.insert_node(Node::new("a", NodeType::Document, "doc1").with_position_hint(10.0, 20.0));
        gw.insert_node(Node::new("b", NodeType::Source, "src1"));
        gw
    }

    async fn loaded_store(gw: &Arc<MemoryGateway>) -> GraphStore {
        let store = GraphStore::new(gw.clone());
        store.load_graph().await;
        store
    }

    #[tokio::test]
    async fn test_load_uses_position_hint() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        let a = store.node(&NodeId::from("a")).unwrap();
        assert_eq!(a.position, Position::new(10.0, 20.0));
        let b = store.node(&NodeId::from("b")).unwrap();
        assert!((0.0..500.0).contains(&b.position.x));
        assert!((0.0..500.0).contains(&b.position.y));
    }

    #[tokio::test]
    async fn test_load_skips_dangling_snapshot_edges() {
        let gw = seeded_gateway();
        gw.insert_edge(Edge::new(EdgeId::from("e1"), "a".into(), "b".into()));
        gw.insert_edge(Edge::new(EdgeId::from("e2"), "a".into(), "ghost".into()));

        let store = loaded_store(&gw).await;

        let edges = store.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge.id.as_str(), "e1");
        assert_eq!(edges[0].status, EdgeStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_board() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let before = store.nodes();
        let mut events = store.subscribe();

        gw.fail_next(GatewayOp::GetGraphData, "offline");
        store.load_graph().await;

        assert_eq!(store.nodes(), before);
        assert!(store.error().unwrap().contains("offline"));
        assert!(!store.snapshot().is_loading);
        assert!(matches!(events.recv().await.unwrap(), GraphEvent::LoadFailed { .. }));
    }

    #[tokio::test]
    async fn test_successful_load_clears_error() {
        let gw = seeded_gateway();
        let store = GraphStore::new(gw.clone());
        gw.fail_next(GatewayOp::GetGraphData, "offline");
        store.load_graph().await;
        assert!(store.error().is_some());

        store.load_graph().await;
        assert!(store.error().is_none());
        assert_eq!(store.nodes().len(), 2);
    }

    #[tokio::test]
    async fn test_delta_never_calls_gateway() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        let report = store.apply_interaction_delta(
            InteractionDelta::drag("a", 99.0, 98.0)
                .with_node(NodeChange::Select {
                    id: "b".into(),
                    selected: true,
                })
                .with_edge(EdgeChange::Add(Edge::new(
                    EdgeId::provisional(),
                    "a".into(),
                    "b".into(),
                ))),
        );
        store.flush().await;

        assert!(report.is_fully_applied());
        assert_eq!(report.nodes_applied, 2);
        assert_eq!(report.edges_applied, 1);
        let a = store.node(&NodeId::from("a")).unwrap();
        assert_eq!(a.position, Position::new(99.0, 98.0));
        assert!(a.dragging);
        assert_eq!(store.selected_nodes(), vec![NodeId::from("b")]);
        assert_eq!(store.edges()[0].status, EdgeStatus::Pending);
        assert_eq!(gw.calls(GatewayOp::UpdateNodePosition), 0);
        assert_eq!(gw.calls(GatewayOp::ConnectNodes), 0);
    }

    #[tokio::test]
    async fn test_delta_rejects_dangling_edge() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        let report = store.apply_interaction_delta(InteractionDelta::new().with_edge(EdgeChange::Add(
            Edge::new(EdgeId::provisional(), "a".into(), "ghost".into()),
        )));

        assert_eq!(report.edges_applied, 0);
        assert_eq!(
            report.rejections[0].reason,
            RejectionReason::MissingEndpoint(NodeId::from("ghost"))
        );
        assert!(store.edges().is_empty());
    }

    #[tokio::test]
    async fn test_delta_node_then_edge_in_one_batch() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        let report = store.apply_interaction_delta(
            InteractionDelta::new()
                .with_node(NodeChange::Add {
                    node: Node::new("c", NodeType::Concept, "idea"),
                    position: Some(Position::new(1.0, 1.0)),
                })
                .with_edge(EdgeChange::Add(Edge::new(
                    EdgeId::provisional(),
                    "a".into(),
                    "c".into(),
                ))),
        );

        assert!(report.is_fully_applied());
        assert_eq!(store.nodes().len(), 3);
        assert_eq!(store.edges().len(), 1);
    }

    #[tokio::test]
    async fn test_delta_node_removal_cascades_edges() {
        let gw = seeded_gateway();
        gw.insert_edge(Edge::new(EdgeId::from("e1"), "a".into(), "b".into()));
        let store = loaded_store(&gw).await;

        let report = store.apply_interaction_delta(
            InteractionDelta::new().with_node(NodeChange::Remove { id: "b".into() }),
        );

        assert_eq!(report.edges_cascaded, vec![EdgeId::from("e1")]);
        assert!(store.edges().is_empty());
        assert_eq!(gw.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_is_optimistic_then_confirmed() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let mut events = store.subscribe();

        let id = store
            .connect(&NodeId::from("a"), &NodeId::from("b"), Some("cites"))
            .unwrap();

        let edge = store.edge(&id).unwrap();
        assert!(id.is_provisional());
        assert_eq!(edge.status, EdgeStatus::Pending);
        assert_eq!(edge.edge.label.as_deref(), Some("cites"));

        store.flush().await;

        assert_eq!(store.edge(&id).unwrap().status, EdgeStatus::Confirmed);
        assert_eq!(gw.edge_count(), 1);
        assert_eq!(events.recv().await.unwrap(), GraphEvent::EdgeAdded { edge_id: id.clone() });
        assert_eq!(events.recv().await.unwrap(), GraphEvent::EdgeConfirmed { edge_id: id });
    }

    #[tokio::test]
    async fn test_connect_uses_default_label() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        let id = store.connect(&NodeId::from("a"), &NodeId::from("b"), None).unwrap();
        store.flush().await;

        assert_eq!(store.edge(&id).unwrap().edge.label.as_deref(), Some("related"));
        assert_eq!(gw.stored_edges()[0].label.as_deref(), Some("related"));
    }

    #[tokio::test]
    async fn test_connect_unknown_node_is_validation_error() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let before = store.snapshot();

        let err = store
            .connect(&NodeId::from("a"), &NodeId::from("ghost"), None)
            .unwrap_err();
        store.flush().await;

        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(store.snapshot(), before);
        assert_eq!(gw.calls(GatewayOp::ConnectNodes), 0);
    }

    #[tokio::test]
    async fn test_connect_existing_pair_returns_same_edge() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let (a, b) = (NodeId::from("a"), NodeId::from("b"));

        let first = store.connect(&a, &b, None).unwrap();
        let second = store.connect(&a, &b, Some("other")).unwrap();
        store.flush().await;

        assert_eq!(first, second);
        assert_eq!(store.edges().len(), 1);
        assert_eq!(gw.calls(GatewayOp::ConnectNodes), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_marks_edge_failed_and_retry_confirms() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let (a, b) = (NodeId::from("a"), NodeId::from("b"));

        gw.fail_next(GatewayOp::ConnectNodes, "disk full");
        let id = store.connect(&a, &b, None).unwrap();
        store.flush().await;

        let edge = store.edge(&id).unwrap();
        assert!(matches!(&edge.status, EdgeStatus::Failed(reason) if reason.contains("disk full")));
        assert!(store.error().unwrap().contains("disk full"));

        // Connecting the same pair again retries the failed edge
        let again = store.connect(&a, &b, None).unwrap();
        store.flush().await;

        assert_eq!(again, id);
        assert_eq!(store.edge(&id).unwrap().status, EdgeStatus::Confirmed);
        assert_eq!(gw.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_through_connect_takes_new_label() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let (a, b) = (NodeId::from("a"), NodeId::from("b"));

        gw.fail_next(GatewayOp::ConnectNodes, "timeout");
        let id = store.connect(&a, &b, Some("cites")).unwrap();
        store.flush().await;
        assert!(store.edge(&id).unwrap().status.is_failed());

        assert_eq!(store.connect(&a, &b, Some("quotes")).unwrap(), id);
        store.flush().await;

        let edge = store.edge(&id).unwrap();
        assert_eq!(edge.status, EdgeStatus::Confirmed);
        assert_eq!(edge.edge.label.as_deref(), Some("quotes"));
        assert_eq!(gw.stored_edges()[0].label.as_deref(), Some("quotes"));
    }

    #[tokio::test]
    async fn test_retry_without_label_keeps_previous_one() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let (a, b) = (NodeId::from("a"), NodeId::from("b"));

        gw.fail_next(GatewayOp::ConnectNodes, "timeout");
        let id = store.connect(&a, &b, Some("cites")).unwrap();
        store.flush().await;

        store.connect(&a, &b, None).unwrap();
        store.flush().await;

        assert_eq!(store.edge(&id).unwrap().edge.label.as_deref(), Some("cites"));
        assert_eq!(gw.stored_edges()[0].label.as_deref(), Some("cites"));
    }

    #[tokio::test]
    async fn test_discard_only_failed_edges() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let (a, b) = (NodeId::from("a"), NodeId::from("b"));

        let id = store.connect(&a, &b, None).unwrap();
        store.flush().await;
        assert!(store.discard_edge(&id).is_err());

        gw.fail_next(GatewayOp::ConnectNodes, "nope");
        let other = store.connect(&b, &a, None).unwrap();
        store.flush().await;
        store.discard_edge(&other).unwrap();

        assert!(store.edge(&other).is_none());
        assert!(store.edge(&id).is_some());
    }

    #[tokio::test]
    async fn test_disconnect_removes_locally_then_remotely() {
        let gw = seeded_gateway();
        gw.insert_edge(Edge::new(EdgeId::from("e1"), "a".into(), "b".into()));
        let store = loaded_store(&gw).await;

        let removed = store.disconnect(&NodeId::from("a"), &NodeId::from("b")).unwrap();
        assert_eq!(removed, vec![EdgeId::from("e1")]);
        assert!(store.edges().is_empty());

        store.flush().await;
        assert_eq!(gw.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_position_persists_hint() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let b = NodeId::from("b");

        store.apply_interaction_delta(InteractionDelta::drag("b", 5.0, 6.0));
        store.commit_position(&b, 5.0, 6.0).unwrap();
        assert!(!store.node(&b).unwrap().dragging);

        store.flush().await;
        assert_eq!(gw.stored_node(&b).unwrap().position_hint(), Some((5.0, 6.0)));
    }

    #[tokio::test]
    async fn test_commit_position_failure_keeps_local_position() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        let a = NodeId::from("a");
        let mut events = store.subscribe();

        gw.fail_next(GatewayOp::UpdateNodePosition, "locked");
        store.commit_position(&a, 300.0, 301.0).unwrap();
        store.flush().await;

        assert_eq!(store.node(&a).unwrap().position, Position::new(300.0, 301.0));
        assert_eq!(gw.stored_node(&a).unwrap().position_hint(), Some((10.0, 20.0)));
        assert!(matches!(
            events.recv().await.unwrap(),
            GraphEvent::PositionPersistFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_commit_position_validates() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        assert!(matches!(
            store.commit_position(&NodeId::from("ghost"), 1.0, 1.0),
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            store.commit_position(&NodeId::from("a"), f64::NAN, 1.0),
            Err(SyncError::Validation(_))
        ));
        store.flush().await;
        assert_eq!(gw.calls(GatewayOp::UpdateNodePosition), 0);
    }

    #[tokio::test]
    async fn test_create_node_places_on_board() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        let id = store.create_node("new idea", NodeType::Concept).await.unwrap();

        assert!(store.has_node(&id));
        assert_eq!(gw.node_count(), 3);
    }

    #[tokio::test]
    async fn test_create_node_failure_leaves_board_unchanged() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;

        gw.fail_next(GatewayOp::CreateNode, "quota");
        assert!(store.create_node("x", NodeType::Image).await.is_none());

        assert_eq!(store.nodes().len(), 2);
        assert!(store.error().unwrap().contains("quota"));
    }

    #[tokio::test]
    async fn test_delete_node_cascades_locally() {
        let gw = seeded_gateway();
        gw.insert_edge(Edge::new(EdgeId::from("e1"), "a".into(), "b".into()));
        let store = loaded_store(&gw).await;

        store.delete_node(&NodeId::from("a")).unwrap();
        assert!(!store.has_node(&NodeId::from("a")));
        assert!(store.edges().is_empty());

        store.flush().await;
        assert_eq!(gw.node_count(), 1);
    }

    #[tokio::test]
    async fn test_reload_replaces_local_overlay() {
        let gw = seeded_gateway();
        let store = loaded_store(&gw).await;
        store.apply_interaction_delta(InteractionDelta::new().with_node(NodeChange::Add {
            node: Node::new("local", NodeType::Concept, "scratch")
                .with_metadata("draft", PropertyValue::Bool(true)),
            position: None,
        }));
        assert_eq!(store.nodes().len(), 3);

        store.load_graph().await;

        assert_eq!(store.nodes().len(), 2);
        assert!(!store.has_node(&NodeId::from("local")));
    }

    #[tokio::test]
    async fn test_older_load_landing_last_is_dropped() {
        let gw = seeded_gateway();
        let store = Arc::new(loaded_store(&gw).await);
        let mut events = store.subscribe();

        let hold = gw.hold_once(GatewayOp::GetGraphData, None);
        let older = {
            let store = store.clone();
            tokio::spawn(async move { store.load_graph().await })
        };
        while gw.calls(GatewayOp::GetGraphData) < 2 {
            tokio::task::yield_now().await;
        }
        assert!(store.snapshot().is_loading);

        gw.insert_node(Node::new("c", NodeType::Concept, "late"));
        store.load_graph().await;
        assert_eq!(store.nodes().len(), 3);
        assert!(!store.snapshot().is_loading);

        // The held load now reads a board without "c"
        gw.delete_node(&NodeId::from("c")).await.unwrap();
        hold.release();
        older.await.unwrap();

        assert_eq!(store.nodes().len(), 3);
        assert!(store.has_node(&NodeId::from("c")));
        let mut loaded = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, GraphEvent::Loaded { .. }) {
                loaded += 1;
            }
        }
        assert_eq!(loaded, 1);
    }

    #[tokio::test]
    async fn test_loading_flag_waits_for_latest_load() {
        let gw = seeded_gateway();
        let store = Arc::new(GraphStore::new(gw.clone()));

        let held = gw.hold_once(GatewayOp::GetGraphData, None);
        let older = {
            let store = store.clone();
            tokio::spawn(async move { store.load_graph().await })
        };
        while gw.calls(GatewayOp::GetGraphData) < 1 {
            tokio::task::yield_now().await;
        }
        let newer_hold = gw.hold_once(GatewayOp::GetGraphData, None);
        let newer = {
            let store = store.clone();
            tokio::spawn(async move { store.load_graph().await })
        };
        while gw.calls(GatewayOp::GetGraphData) < 2 {
            tokio::task::yield_now().await;
        }

        // The older load returns first but the newer one is still out
        held.release();
        older.await.unwrap();
        assert!(store.snapshot().is_loading);

        newer_hold.release();
        newer.await.unwrap();
        assert!(!store.snapshot().is_loading);
        assert_eq!(store.nodes().len(), 2);
    }

    #[tokio::test]
    async fn test_unusable_layout_in_hand_built_config_does_not_panic() {
        let gw = seeded_gateway();
        let mut config = Config::default();
        config.layout.width = f64::INFINITY;
        config.layout.height = f64::NAN;
        let store = GraphStore::with_config(gw.clone(), &config);

        store.load_graph().await;

        let b = store.node(&NodeId::from("b")).unwrap();
        assert!(b.position.is_finite());
    }
}
