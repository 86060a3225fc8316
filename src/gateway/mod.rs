//! Backend gateways
//!
//! The board reaches persistent storage only through the `Gateway` trait.
//! `SqliteGateway` is the durable backend, `MemoryGateway` the in-process
//! one, and `UnavailableGateway` stands in when no backend is reachable.

mod lexical;
mod memory;
mod sqlite;
mod traits;
mod unavailable;

pub use memory::{GatewayOp, HoldHandle, MemoryGateway, DEFAULT_EDGE_LABEL};
pub use sqlite::{ArtifactDir, SqliteGateway};
pub use traits::{Gateway, GatewayError, GatewayResult, SearchMode, SearchResult};
pub use unavailable::UnavailableGateway;
