use crate::types::{MenuNodeId, RoutePath, SessionId};
use http::Method;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid route path input.
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    /// Signing secret missing or too short.
    #[error("signing secret rejected: {0}")]
    WeakSecret(String),
    /// Token serialization or signing failed.
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),
    /// No permission entry for the route.
    #[error("no permission entry for {method} {path}")]
    EntryNotFound { path: RoutePath, method: Method },
    /// Duplicate permission entry on create.
    #[error("permission entry already exists for {method} {path}")]
    DuplicateEntry { path: RoutePath, method: Method },
    /// Session lookup failed.
    #[error("session not found: {session}")]
    SessionNotFound { session: SessionId },
    /// Menu node lookup failed.
    #[error("menu node not found: {node}")]
    NodeNotFound { node: MenuNodeId },
    /// Referenced parent node does not exist.
    #[error("parent menu node not found: {node}")]
    ParentNotFound { node: MenuNodeId },
    /// Deletion refused while children exist.
    #[error("menu node {node} still has children")]
    NodeHasChildren { node: MenuNodeId },
    /// Menu parent chain cycle detected.
    #[error("menu cycle detected at node {node}")]
    MenuCycleDetected { node: MenuNodeId },
    /// Menu traversal depth exceeded.
    #[error("menu depth exceeded at node {node}; max depth {max_depth}")]
    MenuDepthExceeded { node: MenuNodeId, max_depth: usize },
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
