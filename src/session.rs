use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::token::Claims;
use crate::types::{SessionId, UserId};

/// Client metadata captured when a session is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionOrigin {
    /// Client network address.
    pub client_addr: String,
    /// Client agent string.
    pub user_agent: String,
}

impl SessionOrigin {
    /// Creates origin metadata from the raw header/peer values.
    pub fn new(client_addr: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client_addr: client_addr.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// One issued login session.
///
/// Rows are never deleted; the only mutation is flipping `active` to false.
/// Validity is always computed at read time from both `active` and
/// `expires_at`; natural expiry does not touch the flag.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub id: SessionId,
    /// Owning user.
    pub user: UserId,
    /// Opaque token string; unique across all sessions.
    pub token: String,
    /// Expiry instant, identical to the token's embedded expiry.
    pub expires_at: DateTime<Utc>,
    /// Revocation flag.
    pub active: bool,
    /// Client metadata captured at login.
    pub origin: SessionOrigin,
    /// Issuance instant.
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a fresh active record with a generated session id.
    pub fn issued(
        user: UserId,
        token: impl Into<String>,
        origin: SessionOrigin,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::from_string(Uuid::new_v4().to_string()),
            user,
            token: token.into(),
            expires_at,
            active: true,
            origin,
            created_at,
        }
    }

    /// Returns whether the session authenticates at the given instant.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at
    }
}

/// Result of a successful login: the signed token plus its session row.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Signed compact token string.
    pub token: String,
    /// Claims embedded in the token.
    pub claims: Claims,
    /// Persisted session row.
    pub session: SessionRecord,
}
