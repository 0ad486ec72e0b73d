use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Method;

use crate::audit::LoginAttempt;
use crate::error::StoreError;
use crate::matrix::PermissionEntry;
use crate::menu::MenuNode;
use crate::session::SessionRecord;
use crate::store::{AuditStore, MenuStore, PermissionStore, SessionStore};
use crate::types::{MenuNodeId, RoleName, RoutePath, SessionId, UserId};

/// In-memory store implementation for tests and demos.
///
/// Implements every store trait over one shared state, the way a single
/// relational database would back all four relations.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    tokens: RwLock<HashMap<String, SessionId>>,
    entries: RwLock<HashMap<(RoutePath, Method), PermissionEntry>>,
    menus: RwLock<HashMap<MenuNodeId, MenuNode>>,
    audits: RwLock<Vec<LoginAttempt>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: SessionRecord) -> std::result::Result<(), StoreError> {
        let mut tokens = self.inner.tokens.write().expect("poisoned lock");
        if tokens.contains_key(&session.token) {
            return Err("duplicate session token".into());
        }
        tokens.insert(session.token.clone(), session.id.clone());
        let mut sessions = self.inner.sessions.write().expect("poisoned lock");
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<SessionRecord>, StoreError> {
        let tokens = self.inner.tokens.read().expect("poisoned lock");
        let Some(id) = tokens.get(token) else {
            return Ok(None);
        };
        let sessions = self.inner.sessions.read().expect("poisoned lock");
        Ok(sessions
            .get(id)
            .filter(|session| session.is_live(now))
            .cloned())
    }

    async fn find_by_id(
        &self,
        session: &SessionId,
    ) -> std::result::Result<Option<SessionRecord>, StoreError> {
        let sessions = self.inner.sessions.read().expect("poisoned lock");
        Ok(sessions.get(session).cloned())
    }

    async fn deactivate(&self, session: &SessionId) -> std::result::Result<(), StoreError> {
        let mut sessions = self.inner.sessions.write().expect("poisoned lock");
        if let Some(row) = sessions.get_mut(session) {
            row.active = false;
        }
        Ok(())
    }

    async fn deactivate_all(&self, user: &UserId) -> std::result::Result<(), StoreError> {
        let mut sessions = self.inner.sessions.write().expect("poisoned lock");
        for row in sessions.values_mut().filter(|row| row.user == *user) {
            row.active = false;
        }
        Ok(())
    }

    async fn active_for_user(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<SessionRecord>, StoreError> {
        let sessions = self.inner.sessions.read().expect("poisoned lock");
        let mut live: Vec<SessionRecord> = sessions
            .values()
            .filter(|row| row.user == *user && row.is_live(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(live)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_entry(
        &self,
        path: &RoutePath,
        method: &Method,
    ) -> std::result::Result<Option<PermissionEntry>, StoreError> {
        let entries = self.inner.entries.read().expect("poisoned lock");
        Ok(entries.get(&(path.clone(), method.clone())).cloned())
    }

    async fn insert_entry(
        &self,
        entry: PermissionEntry,
    ) -> std::result::Result<bool, StoreError> {
        let mut entries = self.inner.entries.write().expect("poisoned lock");
        let key = (entry.path.clone(), entry.method.clone());
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(key, entry);
        Ok(true)
    }

    async fn update_description(
        &self,
        path: &RoutePath,
        method: &Method,
        description: &str,
    ) -> std::result::Result<bool, StoreError> {
        let mut entries = self.inner.entries.write().expect("poisoned lock");
        match entries.get_mut(&(path.clone(), method.clone())) {
            Some(entry) => {
                entry.description = description.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn grant_role(
        &self,
        path: &RoutePath,
        method: &Method,
        role: RoleName,
    ) -> std::result::Result<bool, StoreError> {
        let mut entries = self.inner.entries.write().expect("poisoned lock");
        match entries.get_mut(&(path.clone(), method.clone())) {
            Some(entry) => {
                entry.roles.insert(role);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_role(
        &self,
        path: &RoutePath,
        method: &Method,
        role: &RoleName,
    ) -> std::result::Result<bool, StoreError> {
        let mut entries = self.inner.entries.write().expect("poisoned lock");
        match entries.get_mut(&(path.clone(), method.clone())) {
            Some(entry) => {
                entry.roles.remove(role.as_str());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_entries(&self) -> std::result::Result<Vec<PermissionEntry>, StoreError> {
        let entries = self.inner.entries.read().expect("poisoned lock");
        Ok(entries.values().cloned().collect())
    }
}

#[async_trait]
impl MenuStore for MemoryStore {
    async fn node(
        &self,
        id: &MenuNodeId,
    ) -> std::result::Result<Option<MenuNode>, StoreError> {
        let menus = self.inner.menus.read().expect("poisoned lock");
        Ok(menus.get(id).cloned())
    }

    async fn children_of(
        &self,
        parent: Option<&MenuNodeId>,
    ) -> std::result::Result<Vec<MenuNode>, StoreError> {
        let menus = self.inner.menus.read().expect("poisoned lock");
        Ok(menus
            .values()
            .filter(|node| node.parent.as_ref() == parent)
            .cloned()
            .collect())
    }

    async fn insert_node(&self, node: MenuNode) -> std::result::Result<(), StoreError> {
        let mut menus = self.inner.menus.write().expect("poisoned lock");
        menus.insert(node.id.clone(), node);
        Ok(())
    }

    async fn update_node(&self, node: MenuNode) -> std::result::Result<bool, StoreError> {
        let mut menus = self.inner.menus.write().expect("poisoned lock");
        match menus.get_mut(&node.id) {
            Some(existing) => {
                let roles = existing.roles.clone();
                *existing = MenuNode { roles, ..node };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_node(&self, id: &MenuNodeId) -> std::result::Result<bool, StoreError> {
        let mut menus = self.inner.menus.write().expect("poisoned lock");
        Ok(menus.remove(id).is_some())
    }

    async fn grant_role(
        &self,
        id: &MenuNodeId,
        role: RoleName,
    ) -> std::result::Result<bool, StoreError> {
        let mut menus = self.inner.menus.write().expect("poisoned lock");
        match menus.get_mut(id) {
            Some(node) => {
                node.roles.insert(role);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_role(
        &self,
        id: &MenuNodeId,
        role: &RoleName,
    ) -> std::result::Result<bool, StoreError> {
        let mut menus = self.inner.menus.write().expect("poisoned lock");
        match menus.get_mut(id) {
            Some(node) => {
                node.roles.remove(role.as_str());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_nodes(&self) -> std::result::Result<Vec<MenuNode>, StoreError> {
        let menus = self.inner.menus.read().expect("poisoned lock");
        Ok(menus.values().cloned().collect())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, attempt: LoginAttempt) -> std::result::Result<(), StoreError> {
        let mut audits = self.inner.audits.write().expect("poisoned lock");
        audits.push(attempt);
        Ok(())
    }

    async fn recent(
        &self,
        limit: usize,
    ) -> std::result::Result<Vec<LoginAttempt>, StoreError> {
        let audits = self.inner.audits.read().expect("poisoned lock");
        Ok(audits.iter().rev().take(limit).cloned().collect())
    }
}
