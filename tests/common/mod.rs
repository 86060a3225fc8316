//! Shared fixtures for board and session integration tests

#![allow(dead_code)]

use crazyboard::gateway::MemoryGateway;
use crazyboard::{ArtifactSession, FocusCoordinator, GraphStore, Node, NodeId, NodeType};
use std::sync::Arc;

pub const A: &str = "A";
pub const B: &str = "B";

pub fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

/// Gateway seeded with `{A: doc1 (document), B: src1 (source)}`
pub fn seeded_gateway() -> Arc<MemoryGateway> {
    let gw = Arc::new(MemoryGateway::new());
    gw.insert_node_with_content(
        Node::new(A, NodeType::Document, "doc1").with_position_hint(120.0, 80.0),
        "# doc1\n\nNotes on the first document.",
    );
    gw.insert_node_with_content(
        Node::new(B, NodeType::Source, "src1"),
        "Quoted source material.",
    );
    gw
}

/// Board already loaded from `gw`
pub async fn loaded_board(gw: &Arc<MemoryGateway>) -> Arc<GraphStore> {
    let store = Arc::new(GraphStore::new(gw.clone()));
    store.load_graph().await;
    assert!(store.error().is_none(), "seed load failed: {:?}", store.error());
    store
}

/// Board, session and coordinator over one gateway
pub async fn workspace(gw: &Arc<MemoryGateway>) -> FocusCoordinator {
    let board = loaded_board(gw).await;
    let session = Arc::new(ArtifactSession::new(gw.clone()));
    FocusCoordinator::new(board, session)
}

/// Yield to the runtime until `cond` holds
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
