//! The artifact editing session
//!
//! One artifact is open at a time. Its buffer is authoritative while open
//! and is persisted only on an explicit save.

mod artifact;
mod events;
mod preview;
mod state;

pub use artifact::ArtifactSession;
pub use events::SessionEvent;
pub use preview::render_markdown;
pub use state::{EditorMode, OpenOutcome, SaveOutcome, SessionPhase, SessionState};
