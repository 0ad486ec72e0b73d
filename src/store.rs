use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Method;

use crate::audit::LoginAttempt;
use crate::error::StoreError;
use crate::matrix::PermissionEntry;
use crate::menu::MenuNode;
use crate::session::SessionRecord;
use crate::types::{MenuNodeId, RoleName, RoutePath, SessionId, UserId};

/// Store interface for issued session tokens.
#[async_trait]
pub trait SessionStore {
    /// Inserts a new session row.
    ///
    /// Implementations must reject a duplicate token string.
    async fn insert(&self, session: SessionRecord) -> std::result::Result<(), StoreError>;

    /// Returns the session for this exact token string, only while it is
    /// active and unexpired. Revoked, expired, and never-issued tokens are
    /// indistinguishable to the caller.
    async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<SessionRecord>, StoreError>;

    /// Returns a session row by identifier, live or not.
    async fn find_by_id(
        &self,
        session: &SessionId,
    ) -> std::result::Result<Option<SessionRecord>, StoreError>;

    /// Flips a session inactive; idempotent, no-op when absent.
    async fn deactivate(&self, session: &SessionId) -> std::result::Result<(), StoreError>;

    /// Flips every session owned by the user inactive.
    async fn deactivate_all(&self, user: &UserId) -> std::result::Result<(), StoreError>;

    /// Returns the user's live sessions, newest first.
    async fn active_for_user(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<SessionRecord>, StoreError>;
}

/// Store interface for permission-matrix entries.
#[async_trait]
pub trait PermissionStore {
    /// Returns the entry for an exact (path, method) pair.
    async fn find_entry(
        &self,
        path: &RoutePath,
        method: &Method,
    ) -> std::result::Result<Option<PermissionEntry>, StoreError>;

    /// Inserts an entry, returning false when the (path, method) pair
    /// already exists. Uniqueness is owned by the store.
    async fn insert_entry(&self, entry: PermissionEntry)
    -> std::result::Result<bool, StoreError>;

    /// Replaces the description of an existing entry.
    async fn update_description(
        &self,
        path: &RoutePath,
        method: &Method,
        description: &str,
    ) -> std::result::Result<bool, StoreError>;

    /// Adds a role grant to an entry.
    async fn grant_role(
        &self,
        path: &RoutePath,
        method: &Method,
        role: RoleName,
    ) -> std::result::Result<bool, StoreError>;

    /// Removes a role grant from an entry.
    async fn revoke_role(
        &self,
        path: &RoutePath,
        method: &Method,
        role: &RoleName,
    ) -> std::result::Result<bool, StoreError>;

    /// Lists every entry.
    async fn list_entries(&self) -> std::result::Result<Vec<PermissionEntry>, StoreError>;
}

/// Store interface for menu nodes and their role grants.
#[async_trait]
pub trait MenuStore {
    /// Returns one node with its role grants loaded.
    async fn node(
        &self,
        id: &MenuNodeId,
    ) -> std::result::Result<Option<MenuNode>, StoreError>;

    /// Returns direct children of a parent (`None` selects root nodes),
    /// unfiltered and in no particular order.
    async fn children_of(
        &self,
        parent: Option<&MenuNodeId>,
    ) -> std::result::Result<Vec<MenuNode>, StoreError>;

    /// Inserts a node.
    async fn insert_node(&self, node: MenuNode) -> std::result::Result<(), StoreError>;

    /// Replaces a node's fields, preserving its role grants. Returns false
    /// when the node is absent.
    async fn update_node(&self, node: MenuNode) -> std::result::Result<bool, StoreError>;

    /// Removes a node. Returns false when the node is absent.
    async fn remove_node(&self, id: &MenuNodeId) -> std::result::Result<bool, StoreError>;

    /// Adds a role grant to a node.
    async fn grant_role(
        &self,
        id: &MenuNodeId,
        role: RoleName,
    ) -> std::result::Result<bool, StoreError>;

    /// Removes a role grant from a node.
    async fn revoke_role(
        &self,
        id: &MenuNodeId,
        role: &RoleName,
    ) -> std::result::Result<bool, StoreError>;

    /// Lists every node.
    async fn list_nodes(&self) -> std::result::Result<Vec<MenuNode>, StoreError>;
}

/// Store interface for login-attempt audit rows.
#[async_trait]
pub trait AuditStore {
    /// Appends one attempt.
    async fn append(&self, attempt: LoginAttempt) -> std::result::Result<(), StoreError>;

    /// Returns the most recent attempts, newest first.
    async fn recent(&self, limit: usize) -> std::result::Result<Vec<LoginAttempt>, StoreError>;
}

/// Composite store trait.
pub trait Store: SessionStore + PermissionStore + MenuStore + AuditStore + Send + Sync {}

impl<T> Store for T where T: SessionStore + PermissionStore + MenuStore + AuditStore + Send + Sync {}
