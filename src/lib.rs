//! Session-backed authentication and RBAC authorization library.
//!
//! This crate provides strong-typed identifiers, a signed session-token codec
//! with server-side revocation, a reconciled (route, method) → roles
//! permission matrix, and a role-filtered menu tree, all over pluggable async
//! store interfaces. The default behavior is deny-by-default and fail-closed.
//! Use [`AuthGate`] for authentication, [`PermissionMatrix`] for per-request
//! access decisions, and [`MenuTree`] for navigation filtering.
//!
//! # Examples
//!
//! Basic authentication flow using the in-memory store (enable `memory-store`):
//! ```no_run
//! use rs_warden::{AuthGateBuilder, TokenCodec};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use chrono::Utc;
//! use rs_warden::MemoryStore;
//! let store = MemoryStore::new();
//! let codec = TokenCodec::new("a-long-enough-signing-secret").unwrap();
//! let gate = AuthGateBuilder::new(codec, store).build();
//! let _ = gate.authenticate("token", Utc::now());
//! # }
//! ```
//!
//! Deciding route access (enable `memory-store`):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # {
//! use http::Method;
//! use rs_warden::{MemoryStore, PermissionMatrix, RoleSet, RoutePath};
//! let matrix = PermissionMatrix::new(MemoryStore::new());
//! let path = RoutePath::try_from("/roles").unwrap();
//! let _ = matrix.check_access(&path, &Method::GET, &RoleSet::new());
//! # }
//! ```
#![forbid(unsafe_code)]

mod audit;
mod error;
mod gate;
mod matrix;
mod menu;
mod session;
mod store;
mod token;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::audit::{AuditQueue, AuditRecorder, LoginAttempt, LoginOutcome, audit_channel};
pub use crate::error::{Error, Result, StoreError};
pub use crate::gate::{AuthError, AuthGate, AuthGateBuilder, Principal};
pub use crate::matrix::{Access, PermissionEntry, PermissionMatrix, RouteDef};
pub use crate::menu::{DEFAULT_PRIVILEGED_ROLE, MenuNode, MenuTree, MenuTreeNode};
pub use crate::session::{IssuedSession, SessionOrigin, SessionRecord};
pub use crate::store::{AuditStore, MenuStore, PermissionStore, SessionStore, Store};
pub use crate::token::{Claims, IssuedToken, TokenCodec, TokenError};
pub use crate::types::{MenuNodeId, RoleName, RoleSet, RoutePath, SessionId, UserId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
