//! Errors surfaced by the board and the artifact session

use crate::gateway::GatewayError;
use crate::graph::NodeId;
use thiserror::Error;

/// Errors that can occur in board and session operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed local request, rejected before any gateway call
    #[error("validation error: {0}")]
    Validation(String),

    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error(transparent)]
    Gateway(GatewayError),
}

impl From<GatewayError> for SyncError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotFound(id) => Self::NotFound(id),
            other => Self::Gateway(other),
        }
    }
}

/// Result type for board and session operations
pub type SyncResult<T> = Result<T, SyncError>;
