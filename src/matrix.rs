use http::Method;

use crate::error::{Error, Result};
use crate::store::PermissionStore;
use crate::types::{RoleName, RoleSet, RoutePath};

/// A route as declared to the HTTP framework.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RouteDef {
    /// Route path template.
    pub path: RoutePath,
    /// HTTP method.
    #[serde(with = "method_serde")]
    pub method: Method,
}

impl RouteDef {
    /// Creates a validated route declaration.
    pub fn new(path: impl AsRef<str>, method: Method) -> Result<Self> {
        Ok(Self {
            path: RoutePath::new(path)?,
            method,
        })
    }
}

/// Persisted mapping from one (path, method) pair to its granted roles.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PermissionEntry {
    /// Route path template, as registered.
    pub path: RoutePath,
    /// HTTP method.
    #[serde(with = "method_serde")]
    pub method: Method,
    /// Free-text description.
    pub description: String,
    /// Roles granted access.
    pub roles: RoleSet,
}

impl PermissionEntry {
    /// Creates an entry with no grants.
    pub fn new(path: RoutePath, method: Method, description: impl Into<String>) -> Self {
        Self {
            path,
            method,
            description: description.into(),
            roles: RoleSet::new(),
        }
    }

    /// Creates the auto-generated entry used during reconciliation.
    fn auto_registered(route: &RouteDef) -> Self {
        let description = format!("{} {} endpoint", route.method, route.path);
        Self::new(route.path.clone(), route.method.clone(), description)
    }
}

/// Per-request access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// At least one caller role is granted on the entry.
    Allow,
    /// The entry exists but grants none of the caller's roles.
    Forbidden,
    /// No entry exists for the route; a configuration gap, not a
    /// permission gap.
    RouteUnknown,
}

/// Authoritative (path, method) → roles matrix with pluggable store.
///
/// Decisions are evaluated against the store on every call; newly granted or
/// revoked roles are visible immediately.
#[derive(Debug)]
pub struct PermissionMatrix<P> {
    store: P,
}

impl<P> PermissionMatrix<P>
where
    P: PermissionStore,
{
    /// Creates a matrix over the given store.
    pub fn new(store: P) -> Self {
        Self { store }
    }

    /// Ensures every declared route has an entry.
    ///
    /// Append-only and idempotent: existing entries are left untouched,
    /// entries for routes no longer declared are retained, and re-running
    /// over an unchanged declaration set inserts nothing. Returns the number
    /// of entries created.
    pub async fn reconcile(&self, declared: &[RouteDef]) -> Result<usize> {
        let mut inserted = 0;
        for route in declared {
            let existing = self
                .store
                .find_entry(&route.path, &route.method)
                .await
                .map_err(Error::from)?;
            if existing.is_some() {
                continue;
            }
            let entry = PermissionEntry::auto_registered(route);
            if self.store.insert_entry(entry).await.map_err(Error::from)? {
                tracing::info!(path = %route.path, method = %route.method, "permission entry registered");
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Decides access for the resolved route template and caller roles.
    pub async fn check_access(
        &self,
        path: &RoutePath,
        method: &Method,
        roles: &RoleSet,
    ) -> Result<Access> {
        let entry = self
            .store
            .find_entry(path, method)
            .await
            .map_err(Error::from)?;
        Ok(match entry {
            None => Access::RouteUnknown,
            Some(entry) if entry.roles.intersects(roles) => Access::Allow,
            Some(_) => Access::Forbidden,
        })
    }

    /// Creates an entry explicitly; duplicate (path, method) is a conflict.
    pub async fn create_entry(&self, entry: PermissionEntry) -> Result<()> {
        let path = entry.path.clone();
        let method = entry.method.clone();
        if self.store.insert_entry(entry).await.map_err(Error::from)? {
            Ok(())
        } else {
            Err(Error::DuplicateEntry { path, method })
        }
    }

    /// Returns one entry.
    pub async fn entry(&self, path: &RoutePath, method: &Method) -> Result<PermissionEntry> {
        self.store
            .find_entry(path, method)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::EntryNotFound {
                path: path.clone(),
                method: method.clone(),
            })
    }

    /// Lists every entry, stale ones included.
    pub async fn entries(&self) -> Result<Vec<PermissionEntry>> {
        self.store.list_entries().await.map_err(Error::from)
    }

    /// Replaces an entry's description.
    pub async fn update_description(
        &self,
        path: &RoutePath,
        method: &Method,
        description: &str,
    ) -> Result<()> {
        let updated = self
            .store
            .update_description(path, method, description)
            .await
            .map_err(Error::from)?;
        if updated {
            Ok(())
        } else {
            Err(Error::EntryNotFound {
                path: path.clone(),
                method: method.clone(),
            })
        }
    }

    /// Grants a role on an entry.
    pub async fn assign_role(
        &self,
        path: &RoutePath,
        method: &Method,
        role: RoleName,
    ) -> Result<()> {
        let granted = self
            .store
            .grant_role(path, method, role)
            .await
            .map_err(Error::from)?;
        if granted {
            Ok(())
        } else {
            Err(Error::EntryNotFound {
                path: path.clone(),
                method: method.clone(),
            })
        }
    }

    /// Removes a role grant from an entry.
    pub async fn remove_role(
        &self,
        path: &RoutePath,
        method: &Method,
        role: &RoleName,
    ) -> Result<()> {
        let revoked = self
            .store
            .revoke_role(path, method, role)
            .await
            .map_err(Error::from)?;
        if revoked {
            Ok(())
        } else {
            Err(Error::EntryNotFound {
                path: path.clone(),
                method: method.clone(),
            })
        }
    }
}

mod method_serde {
    use http::Method;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(D::Error::custom)
    }
}
