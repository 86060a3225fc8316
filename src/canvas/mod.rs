//! The board: nodes and edges on an infinite canvas
//!
//! `GraphStore` holds the client-resident working set. Direct manipulation
//! arrives as `InteractionDelta`s and stays local; committed operations
//! (connect, disconnect, move, delete) update locally first and then sync
//! through the gateway in the background.

mod delta;
mod events;
mod layout;
mod store;

pub use delta::{
    DeltaReport, EdgeChange, InteractionDelta, NodeChange, Rejection, RejectionReason,
};
pub use events::GraphEvent;
pub use layout::{Placement, Position};
pub use store::{CanvasEdge, CanvasNode, CanvasState, GraphStore};
