//! Crazyboard: optimistic graph sync and artifact editing for a knowledge board
//!
//! A client-side engine for a personal knowledge board. Nodes are artifacts
//! (documents, sources, concepts, images) laid out on an infinite canvas and
//! linked by labelled edges. The engine keeps the board and the open
//! artifact responsive while a slower backend catches up.
//!
//! # Core Concepts
//!
//! - **Gateway**: the only path to persistent storage (`Gateway` trait)
//! - **Board**: the client-resident node/edge working set with ephemeral
//!   layout; local changes land first, gateway calls follow in the background
//! - **Artifact session**: the single open artifact and its editing buffer,
//!   with last-issued-wins opens and explicit saves
//! - **Focus**: the one path by which the board and search open artifacts
//!
//! # Example
//!
//! ```
//! use crazyboard::{GraphStore, MemoryGateway};
//! use std::sync::Arc;
//!
//! let store = GraphStore::new(Arc::new(MemoryGateway::new()));
//! // Board is empty until the first load
//! assert!(store.nodes().is_empty());
//! ```

pub mod canvas;
pub mod config;
pub mod error;
pub mod focus;
pub mod gateway;
mod graph;
pub mod search;
pub mod session;

pub use canvas::{
    CanvasEdge, CanvasNode, CanvasState, DeltaReport, EdgeChange, GraphEvent, GraphStore,
    InteractionDelta, NodeChange, Position,
};
pub use config::{Config, ConfigError};
pub use error::{SyncError, SyncResult};
pub use focus::{DirtyPolicy, FocusCoordinator, FocusOutcome};
pub use gateway::{
    Gateway, GatewayError, GatewayResult, MemoryGateway, SearchMode, SearchResult, SqliteGateway,
    UnavailableGateway,
};
pub use graph::{
    Edge, EdgeId, EdgeStatus, GraphSnapshot, Metadata, Node, NodeId, NodeType, PropertyValue,
};
pub use search::{SearchDebouncer, SearchOutcome};
pub use session::{
    ArtifactSession, EditorMode, OpenOutcome, SaveOutcome, SessionEvent, SessionPhase,
    SessionState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
