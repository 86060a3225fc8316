//! Focus coordination between the board and the artifact session
//!
//! Every "open this node" intent (activating a node on the board, picking a
//! search result) goes through `FocusCoordinator::focus`, which calls
//! `open_artifact` exactly once and never writes the buffer itself.

use crate::canvas::GraphStore;
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::gateway::SearchResult;
use crate::graph::NodeId;
use crate::session::{ArtifactSession, OpenOutcome, SaveOutcome};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Saves an auto-save may issue while edits keep landing mid-save
const AUTOSAVE_ATTEMPTS: usize = 3;

/// What switching focus does to unsaved edits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyPolicy {
    /// Save first; stay put if the save fails
    #[default]
    AutoSave,
    /// Stay put and report
    Refuse,
    /// Switch and lose the edits
    Discard,
}

/// How a focus request ended
#[derive(Debug, Clone, PartialEq)]
pub enum FocusOutcome {
    Opened,
    /// The node was already open; nothing happened
    AlreadyFocused,
    /// Unsaved edits blocked the switch; the current artifact stays open
    Refused { reason: String },
    /// A later focus or clear request won
    Superseded,
    Failed(String),
    /// Nothing is open any more
    Cleared,
}

impl From<OpenOutcome> for FocusOutcome {
    fn from(outcome: OpenOutcome) -> Self {
        match outcome {
            OpenOutcome::Opened => Self::Opened,
            OpenOutcome::Superseded => Self::Superseded,
            OpenOutcome::Failed(e) => Self::Failed(e),
        }
    }
}

pub struct FocusCoordinator {
    graph: Arc<GraphStore>,
    session: Arc<ArtifactSession>,
    policy: DirtyPolicy,
    /// Bumped by every focus and clear request; the latest one wins
    intent: AtomicU64,
}

impl FocusCoordinator {
    pub fn new(graph: Arc<GraphStore>, session: Arc<ArtifactSession>) -> Self {
        Self::with_policy(graph, session, DirtyPolicy::default())
    }

    pub fn with_policy(
        graph: Arc<GraphStore>,
        session: Arc<ArtifactSession>,
        policy: DirtyPolicy,
    ) -> Self {
        Self {
            graph,
            session,
            policy,
            intent: AtomicU64::new(0),
        }
    }

    pub fn with_config(
        graph: Arc<GraphStore>,
        session: Arc<ArtifactSession>,
        config: &Config,
    ) -> Self {
        Self::with_policy(graph, session, config.dirty_policy)
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn session(&self) -> &Arc<ArtifactSession> {
        &self.session
    }

    pub fn policy(&self) -> DirtyPolicy {
        self.policy
    }

    /// Open `id` in the session, applying the dirty policy first
    pub async fn focus(&self, id: &NodeId) -> FocusOutcome {
        let intent = self.next_intent();
        let state = self.session.state();
        if state.active_id() == Some(id) && !state.is_loading {
            return FocusOutcome::AlreadyFocused;
        }

        if state.is_dirty && state.active_node.is_some() {
            if let Some(stop) = self.settle_dirty(id, intent).await {
                return stop;
            }
        }
        if !self.is_current(intent) {
            debug!(node = %id, "focus request superseded");
            return FocusOutcome::Superseded;
        }

        self.session.open_artifact(id).await.into()
    }

    fn next_intent(&self) -> u64 {
        self.intent.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, intent: u64) -> bool {
        self.intent.load(Ordering::SeqCst) == intent
    }

    /// Returns `Some` if the switch must not happen.
    ///
    /// Under auto-save, `None` means the buffer was clean when the last save
    /// returned.
    async fn settle_dirty(&self, next: &NodeId, intent: u64) -> Option<FocusOutcome> {
        match self.policy {
            DirtyPolicy::AutoSave => {
                for _ in 0..AUTOSAVE_ATTEMPTS {
                    match self.session.save_content().await {
                        SaveOutcome::Saved => {}
                        SaveOutcome::NoActiveArtifact => return None,
                        SaveOutcome::Failed(e) => {
                            warn!(next = %next, error = %e, "auto-save failed; staying on current artifact");
                            return Some(FocusOutcome::Refused {
                                reason: format!("unsaved changes could not be saved: {}", e),
                            });
                        }
                    }
                    if !self.is_current(intent) {
                        return Some(FocusOutcome::Superseded);
                    }
                    if !self.session.is_dirty() {
                        return None;
                    }
                    debug!(next = %next, "buffer edited during auto-save; saving again");
                }
                warn!(next = %next, "buffer kept changing during auto-save; staying on current artifact");
                Some(FocusOutcome::Refused {
                    reason: "edits kept arriving while saving".to_string(),
                })
            }
            DirtyPolicy::Refuse => Some(FocusOutcome::Refused {
                reason: "current artifact has unsaved changes".to_string(),
            }),
            DirtyPolicy::Discard => {
                warn!(next = %next, "discarding unsaved changes on focus switch");
                None
            }
        }
    }

    /// Open the node behind a search hit
    pub async fn focus_search_result(&self, result: &SearchResult) -> FocusOutcome {
        self.focus(&result.id).await
    }

    /// Close the open artifact, honouring the dirty policy
    pub async fn clear_focus(&self) -> FocusOutcome {
        let intent = self.next_intent();
        let state = self.session.state();
        if let Some(current) = state.active_id().filter(|_| state.is_dirty) {
            if let Some(stop) = self.settle_dirty(current, intent).await {
                return stop;
            }
        }
        if !self.is_current(intent) {
            return FocusOutcome::Superseded;
        }
        self.session.reset();
        FocusOutcome::Cleared
    }

    /// Delete a node from the board; closes it first if it is open
    pub fn delete_node(&self, id: &NodeId) -> SyncResult<()> {
        if !self.graph.has_node(id) {
            return Err(SyncError::Validation(format!(
                "cannot delete node {}: not on the board",
                id
            )));
        }
        if self.session.active_id().as_ref() == Some(id) {
            info!(node = %id, "closing deleted artifact");
            self.session.reset();
        }
        self.graph.delete_node(id)
    }
}
