//! ArtifactSession: the single open artifact and its editing buffer

use super::events::SessionEvent;
use super::preview::render_markdown;
use super::state::{EditorMode, OpenOutcome, SaveOutcome, SessionState};
use crate::config::Config;
use crate::gateway::{Gateway, GatewayResult};
use crate::graph::{Node, NodeId};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Session state plus the bookkeeping observers never see
#[derive(Default)]
struct Inner {
    view: SessionState,
    /// Bumped by every open and reset; responses tagged with an older
    /// generation are stale
    generation: u64,
    /// Bumped by every edit
    revision: u64,
    saves_in_flight: usize,
}

impl Inner {
    fn begin_save(&mut self) {
        self.saves_in_flight += 1;
        self.view.is_saving = true;
    }

    fn end_save(&mut self) {
        self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
        self.view.is_saving = self.saves_in_flight > 0;
    }
}

/// Holds at most one open artifact and its buffer.
///
/// The buffer is never silently discarded: failed loads and failed saves
/// leave it as it was and report through `error`. Opens are last-issued-wins.
pub struct ArtifactSession {
    gateway: Arc<dyn Gateway>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl ArtifactSession {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_config(gateway, &Config::default())
    }

    pub fn with_config(gateway: Arc<dyn Gateway>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            gateway,
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    // --- Reads ---

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().view.clone()
    }

    pub fn active_id(&self) -> Option<NodeId> {
        self.inner.lock().unwrap().view.active_id().cloned()
    }

    pub fn content(&self) -> String {
        self.inner.lock().unwrap().view.content.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().unwrap().view.is_dirty
    }

    pub fn mode(&self) -> EditorMode {
        self.inner.lock().unwrap().view.mode
    }

    /// True in edit mode. Mode is presentation only: `set_content` is
    /// accepted either way.
    pub fn is_editable(&self) -> bool {
        self.mode() == EditorMode::Edit
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().unwrap().view.error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.lock().unwrap().view.error = None;
    }

    /// The buffer rendered as HTML, as preview mode shows it
    pub fn preview_html(&self) -> String {
        render_markdown(&self.content())
    }

    // --- Open ---

    /// Open `id`, replacing whatever is open.
    ///
    /// Fetches the node and its persisted content and installs both at once,
    /// so the buffer is clean afterwards. If another open or a reset is
    /// issued before this one completes, its response is dropped and
    /// `Superseded` is returned. On failure the previously open artifact and
    /// buffer are left in place.
    ///
    /// Callers that care about unsaved edits must deal with them first; see
    /// `FocusCoordinator`.
    pub async fn open_artifact(&self, id: &NodeId) -> OpenOutcome {
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.generation += 1;
            inner.view.is_loading = true;
            inner.view.error = None;
            inner.generation
        };
        self.notify(SessionEvent::LoadStarted { node_id: id.clone() });

        let fetched = self.fetch(id).await;

        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation {
            drop(inner);
            debug!(node = %id, "discarding response for superseded open");
            self.notify(SessionEvent::StaleResponseDiscarded { node_id: id.clone() });
            return OpenOutcome::Superseded;
        }

        inner.view.is_loading = false;
        match fetched {
            Ok((node, content)) => {
                inner.view.active_node = Some(node);
                inner.view.content = content;
                inner.view.is_dirty = false;
                inner.revision += 1;
                drop(inner);
                info!(node = %id, "artifact opened");
                self.notify(SessionEvent::Opened { node_id: id.clone() });
                OpenOutcome::Opened
            }
            Err(e) => {
                let message = format!("failed to open {}: {}", id, e);
                inner.view.error = Some(message.clone());
                drop(inner);
                warn!(node = %id, error = %e, "artifact load failed");
                self.notify(SessionEvent::LoadFailed {
                    node_id: id.clone(),
                    error: e.to_string(),
                });
                OpenOutcome::Failed(message)
            }
        }
    }

    async fn fetch(&self, id: &NodeId) -> GatewayResult<(Node, String)> {
        let node = self.gateway.get_node(id).await?;
        let content = self.gateway.load_node_content(id).await?;
        Ok((node, content))
    }

    // --- Edit ---

    /// Replace the buffer. Always marks the session dirty.
    pub fn set_content(&self, text: impl Into<String>) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.view.content = text.into();
            inner.view.is_dirty = true;
            inner.revision += 1;
        }
        self.notify(SessionEvent::ContentChanged);
    }

    pub fn set_mode(&self, mode: EditorMode) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.view.mode == mode {
                return;
            }
            inner.view.mode = mode;
        }
        self.notify(SessionEvent::ModeChanged { mode });
    }

    pub fn toggle_mode(&self) -> EditorMode {
        let mode = self.mode().toggled();
        self.set_mode(mode);
        mode
    }

    // --- Save ---

    /// Persist the buffer for the open artifact.
    ///
    /// Success clears the dirty flag only if nothing was edited and nothing
    /// else was opened while the call was in flight. Failure keeps the
    /// buffer and leaves the session dirty.
    pub async fn save_content(&self) -> SaveOutcome {
        let (id, content, generation, revision) = {
            let mut inner = self.inner.lock().unwrap();
            let Some(id) = inner.view.active_id().cloned() else {
                return SaveOutcome::NoActiveArtifact;
            };
            inner.begin_save();
            inner.view.error = None;
            (
                id,
                inner.view.content.clone(),
                inner.generation,
                inner.revision,
            )
        };
        self.notify(SessionEvent::SaveStarted { node_id: id.clone() });

        let result = self.gateway.save_node_content(&id, &content).await;

        let mut inner = self.inner.lock().unwrap();
        inner.end_save();
        let same_artifact = inner.generation == generation;
        match result {
            Ok(()) => {
                if same_artifact && inner.revision == revision {
                    inner.view.is_dirty = false;
                }
                drop(inner);
                debug!(node = %id, bytes = content.len(), "artifact saved");
                self.notify(SessionEvent::Saved { node_id: id });
                SaveOutcome::Saved
            }
            Err(e) => {
                let message = format!("failed to save {}: {}", id, e);
                if same_artifact {
                    inner.view.is_dirty = true;
                }
                inner.view.error = Some(message.clone());
                drop(inner);
                warn!(node = %id, error = %e, "artifact save failed; buffer kept");
                self.notify(SessionEvent::SaveFailed {
                    node_id: id,
                    error: e.to_string(),
                });
                SaveOutcome::Failed(message)
            }
        }
    }

    /// Close the artifact and drop the buffer. Any open still in flight is
    /// superseded. The editor mode is kept.
    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.generation += 1;
            inner.revision += 1;
            let mode = inner.view.mode;
            let is_saving = inner.view.is_saving;
            inner.view = SessionState {
                mode,
                is_saving,
                ..SessionState::default()
            };
        }
        self.notify(SessionEvent::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayOp, MemoryGateway};
    use crate::graph::NodeType;
    use crate::session::SessionPhase;

    fn seeded_gateway() -> Arc<MemoryGateway> {
        let gw = Arc::new(MemoryGateway::new());
        gw.insert_node_with_content(Node::new("n1", NodeType::Document, "first"), "# One");
        gw.insert_node_with_content(Node::new("n2", NodeType::Document, "second"), "# Two");
        gw
    }

    #[tokio::test]
    async fn test_open_installs_node_and_content() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());

        assert_eq!(session.open_artifact(&NodeId::from("n1")).await, OpenOutcome::Opened);

        let state = session.state();
        assert_eq!(state.active_id(), Some(&NodeId::from("n1")));
        assert_eq!(state.content, "# One");
        assert!(!state.is_dirty);
        assert_eq!(state.phase(), SessionPhase::Ready { dirty: false });
    }

    #[tokio::test]
    async fn test_open_missing_node_keeps_previous() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());
        session.open_artifact(&NodeId::from("n1")).await;
        session.set_content("draft");

        let outcome = session.open_artifact(&NodeId::from("ghost")).await;

        assert!(matches!(outcome, OpenOutcome::Failed(_)));
        let state = session.state();
        assert_eq!(state.active_id(), Some(&NodeId::from("n1")));
        assert_eq!(state.content, "draft");
        assert!(state.is_dirty);
        assert!(!state.is_loading);
        assert!(state.error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_set_content_marks_dirty() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());

        session.set_content("anything");

        assert!(session.is_dirty());
        assert_eq!(session.content(), "anything");
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());
        let n1 = NodeId::from("n1");
        session.open_artifact(&n1).await;
        session.set_content("# Rewritten");

        assert_eq!(session.save_content().await, SaveOutcome::Saved);
        assert!(!session.is_dirty());
        assert_eq!(gw.stored_content(&n1).as_deref(), Some("# Rewritten"));

        session.reset();
        session.open_artifact(&n1).await;
        assert_eq!(session.content(), "# Rewritten");
    }

    #[tokio::test]
    async fn test_save_without_artifact_is_noop() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());

        assert_eq!(session.save_content().await, SaveOutcome::NoActiveArtifact);
        assert_eq!(gw.calls(GatewayOp::SaveNodeContent), 0);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_buffer_dirty() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());
        session.open_artifact(&NodeId::from("n1")).await;
        session.set_content("precious");

        gw.fail_next(GatewayOp::SaveNodeContent, "disk full");
        let outcome = session.save_content().await;

        assert!(matches!(outcome, SaveOutcome::Failed(ref m) if m.contains("disk full")));
        let state = session.state();
        assert_eq!(state.content, "precious");
        assert!(state.is_dirty);
        assert!(!state.is_saving);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_mode_never_touches_buffer() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());
        session.open_artifact(&NodeId::from("n1")).await;
        session.set_content("edited");

        assert_eq!(session.toggle_mode(), EditorMode::Preview);
        assert!(!session.is_editable());
        assert_eq!(session.content(), "edited");
        assert!(session.is_dirty());

        session.set_mode(EditorMode::Edit);
        assert!(session.is_editable());
        assert!(session.is_dirty());
    }

    #[tokio::test]
    async fn test_preview_renders_buffer() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());
        session.open_artifact(&NodeId::from("n2")).await;

        assert!(session.preview_html().contains("<h1>Two</h1>"));
    }

    #[tokio::test]
    async fn test_reset_returns_to_empty_and_keeps_mode() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());
        session.open_artifact(&NodeId::from("n1")).await;
        session.set_mode(EditorMode::Preview);

        session.reset();

        let state = session.state();
        assert_eq!(state.phase(), SessionPhase::Empty);
        assert!(state.content.is_empty());
        assert_eq!(state.mode, EditorMode::Preview);
    }

    #[tokio::test]
    async fn test_events_for_open_and_save() {
        let gw = seeded_gateway();
        let session = ArtifactSession::new(gw.clone());
        let mut events = session.subscribe();
        let n1 = NodeId::from("n1");

        session.open_artifact(&n1).await;
        session.save_content().await;

        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoadStarted { node_id: n1.clone() });
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Opened { node_id: n1.clone() });
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SaveStarted { node_id: n1.clone() });
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Saved { node_id: n1 });
    }
}
