use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::audit::{AuditRecorder, LoginAttempt};
use crate::error::{Error, Result, StoreError};
use crate::session::{IssuedSession, SessionOrigin, SessionRecord};
use crate::store::SessionStore;
use crate::token::TokenCodec;
use crate::types::{RoleName, RoleSet, SessionId, UserId};

/// Reason a request failed authentication.
///
/// Messages are intentionally generic: a revoked token and a never-issued one
/// must be indistinguishable to a probing client.
#[derive(Debug, Error)]
pub enum AuthError {
    /// `Authorization: Bearer` header absent or malformed.
    #[error("missing credentials")]
    MissingCredentials,
    /// No live session matches the token.
    #[error("token not recognized")]
    TokenNotRecognized,
    /// Signature or embedded expiry rejected.
    #[error("invalid token")]
    InvalidToken,
    /// Store failure while checking the session registry; never
    /// authenticates.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

/// The authenticated identity attached to a request.
///
/// A projection of the verified claims plus the live session's identifier,
/// which lets logout revoke exactly the calling session.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Principal {
    /// User identifier.
    pub user: UserId,
    /// Username at issuance time.
    pub username: String,
    /// Role names carried by the token.
    pub roles: RoleSet,
    /// Identifier of the session that authenticated this request.
    pub session: SessionId,
}

/// Builder for [`AuthGate`].
pub struct AuthGateBuilder<S> {
    codec: TokenCodec,
    sessions: S,
    audit: Option<AuditRecorder>,
}

impl<S> AuthGateBuilder<S> {
    /// Creates a new builder.
    pub fn new(codec: TokenCodec, sessions: S) -> Self {
        Self {
            codec,
            sessions,
            audit: None,
        }
    }

    /// Attaches a login-audit recorder.
    pub fn audit(mut self, recorder: AuditRecorder) -> Self {
        self.audit = Some(recorder);
        self
    }

    /// Overrides the session lifetime (default 24h).
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.codec = self.codec.with_ttl(ttl);
        self
    }

    /// Builds the gate.
    pub fn build(self) -> AuthGate<S> {
        AuthGate {
            codec: self.codec,
            sessions: self.sessions,
            audit: self.audit,
        }
    }
}

/// Per-request authentication gate over a token codec and session registry.
///
/// Both dependencies are injected at construction; the gate holds no other
/// state and is safe to share across request tasks.
#[derive(Debug)]
pub struct AuthGate<S> {
    codec: TokenCodec,
    sessions: S,
    audit: Option<AuditRecorder>,
}

impl<S> AuthGate<S>
where
    S: SessionStore,
{
    /// Issues a new session for an already-verified user.
    ///
    /// The expiry instant is computed once and shared by the signed claim and
    /// the stored row, so the two validity checks cannot drift. When a
    /// recorder is attached, a success attempt is enqueued without blocking.
    pub async fn login(
        &self,
        user: UserId,
        username: impl Into<String>,
        roles: impl IntoIterator<Item = RoleName>,
        origin: SessionOrigin,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession> {
        let username = username.into();
        let issued = self
            .codec
            .issue_at(user.clone(), username.clone(), roles, now)?;
        let record = SessionRecord::issued(
            user.clone(),
            issued.token.clone(),
            origin.clone(),
            now,
            issued.claims.expires_at(),
        );
        self.sessions
            .insert(record.clone())
            .await
            .map_err(Error::from)?;

        if let Some(audit) = &self.audit {
            audit.record(LoginAttempt::success(user, username, origin, now));
        }

        Ok(IssuedSession {
            token: issued.token,
            claims: issued.claims,
            session: record,
        })
    }

    /// Enqueues a failed login attempt when a recorder is attached.
    pub fn record_failed_login(
        &self,
        username: impl Into<String>,
        origin: SessionOrigin,
        now: DateTime<Utc>,
        reason: impl Into<String>,
    ) {
        if let Some(audit) = &self.audit {
            audit.record(LoginAttempt::failed(username, origin, now, reason));
        }
    }

    /// Authenticates from a raw `Authorization` header value.
    pub async fn authenticate_header(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> std::result::Result<Principal, AuthError> {
        let token = bearer_token(header)?;
        self.authenticate(token, now).await
    }

    /// Authenticates a bearer token.
    ///
    /// The session registry is consulted before the signature: revocation is
    /// the source of truth for "is this session alive", so a revoked token is
    /// rejected even while its signature and embedded expiry still hold.
    pub async fn authenticate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Principal, AuthError> {
        let session = self
            .sessions
            .find_active(token, now)
            .await
            .map_err(|error| {
                tracing::warn!(%error, "session lookup failed; denying request");
                AuthError::Store(error)
            })?
            .ok_or(AuthError::TokenNotRecognized)?;

        let claims = self
            .codec
            .verify(token, now)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(Principal {
            user: claims.user_id,
            username: claims.username,
            roles: claims.roles.into_iter().collect(),
            session: session.id,
        })
    }

    /// Revokes the calling session; idempotent.
    pub async fn logout(&self, session: &SessionId) -> Result<()> {
        self.sessions.deactivate(session).await.map_err(Error::from)
    }

    /// Revokes one session owned by the user; unknown or foreign sessions
    /// are not found.
    pub async fn revoke(&self, user: &UserId, session: &SessionId) -> Result<()> {
        let record = self
            .sessions
            .find_by_id(session)
            .await
            .map_err(Error::from)?;
        match record {
            Some(record) if record.user == *user => {
                self.sessions.deactivate(session).await.map_err(Error::from)
            }
            _ => Err(Error::SessionNotFound {
                session: session.clone(),
            }),
        }
    }

    /// Revokes every session ever issued to the user.
    pub async fn logout_all(&self, user: &UserId) -> Result<()> {
        self.sessions
            .deactivate_all(user)
            .await
            .map_err(Error::from)
    }

    /// Lists the user's live sessions, newest first.
    pub async fn active_sessions(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        self.sessions
            .active_for_user(user, now)
            .await
            .map_err(Error::from)
    }
}

fn bearer_token(header: Option<&str>) -> std::result::Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingCredentials)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredentials)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::audit_channel;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SECRET: &str = "gate-test-signing-secret";

    #[derive(Default)]
    struct TestSessions {
        rows: Mutex<HashMap<SessionId, SessionRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl SessionStore for &TestSessions {
        async fn insert(
            &self,
            session: SessionRecord,
        ) -> std::result::Result<(), crate::StoreError> {
            let mut rows = self.rows.lock().expect("poisoned lock");
            if rows.values().any(|row| row.token == session.token) {
                return Err("duplicate token".into());
            }
            rows.insert(session.id.clone(), session);
            Ok(())
        }

        async fn find_active(
            &self,
            token: &str,
            now: DateTime<Utc>,
        ) -> std::result::Result<Option<SessionRecord>, crate::StoreError> {
            if self.fail {
                return Err("registry unavailable".into());
            }
            let rows = self.rows.lock().expect("poisoned lock");
            Ok(rows
                .values()
                .find(|row| row.token == token && row.is_live(now))
                .cloned())
        }

        async fn find_by_id(
            &self,
            session: &SessionId,
        ) -> std::result::Result<Option<SessionRecord>, crate::StoreError> {
            let rows = self.rows.lock().expect("poisoned lock");
            Ok(rows.get(session).cloned())
        }

        async fn deactivate(
            &self,
            session: &SessionId,
        ) -> std::result::Result<(), crate::StoreError> {
            let mut rows = self.rows.lock().expect("poisoned lock");
            if let Some(row) = rows.get_mut(session) {
                row.active = false;
            }
            Ok(())
        }

        async fn deactivate_all(
            &self,
            user: &UserId,
        ) -> std::result::Result<(), crate::StoreError> {
            let mut rows = self.rows.lock().expect("poisoned lock");
            for row in rows.values_mut().filter(|row| row.user == *user) {
                row.active = false;
            }
            Ok(())
        }

        async fn active_for_user(
            &self,
            user: &UserId,
            now: DateTime<Utc>,
        ) -> std::result::Result<Vec<SessionRecord>, crate::StoreError> {
            let rows = self.rows.lock().expect("poisoned lock");
            let mut live: Vec<SessionRecord> = rows
                .values()
                .filter(|row| row.user == *user && row.is_live(now))
                .cloned()
                .collect();
            live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(live)
        }
    }

    fn gate(sessions: &TestSessions) -> AuthGate<&TestSessions> {
        AuthGateBuilder::new(TokenCodec::new(SECRET).unwrap(), sessions).build()
    }

    fn user() -> UserId {
        UserId::try_from("user_1").unwrap()
    }

    fn login(gate: &AuthGate<&TestSessions>, now: DateTime<Utc>) -> IssuedSession {
        block_on(gate.login(
            user(),
            "alice",
            vec![RoleName::try_from("ops").unwrap()],
            SessionOrigin::new("127.0.0.1", "test-agent"),
            now,
        ))
        .unwrap()
    }

    #[test]
    fn authenticate_header_rejects_missing_or_malformed() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();

        for header in [None, Some("Basic abc"), Some("Bearer "), Some("bearer x")] {
            let err = block_on(gate.authenticate_header(header, now)).expect_err("must reject");
            assert!(matches!(err, AuthError::MissingCredentials), "{header:?}");
        }
    }

    #[test]
    fn login_then_authenticate_yields_principal() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();
        let issued = login(&gate, now);

        let header = format!("Bearer {}", issued.token);
        let principal = block_on(gate.authenticate_header(Some(&header), now)).unwrap();
        assert_eq!(principal.user, user());
        assert_eq!(principal.username, "alice");
        assert!(principal.roles.contains("ops"));
        assert_eq!(principal.session, issued.session.id);
    }

    #[test]
    fn claim_and_row_expiry_agree() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let issued = login(&gate, Utc::now());
        assert_eq!(issued.claims.expires_at(), issued.session.expires_at);
    }

    #[test]
    fn unknown_token_is_not_recognized() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();

        // Signed by us, but never registered as a session.
        let stray = TokenCodec::new(SECRET)
            .unwrap()
            .issue_at(user(), "alice", Vec::new(), now)
            .unwrap();
        let err = block_on(gate.authenticate(&stray.token, now)).expect_err("must reject");
        assert!(matches!(err, AuthError::TokenNotRecognized));
    }

    #[test]
    fn revoked_session_fails_before_signature_check() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();
        let issued = login(&gate, now);

        block_on(gate.logout(&issued.session.id)).unwrap();

        // Signature and embedded expiry are still valid; revocation wins.
        let err = block_on(gate.authenticate(&issued.token, now)).expect_err("must reject");
        assert!(matches!(err, AuthError::TokenNotRecognized));
    }

    #[test]
    fn registered_but_forged_token_is_invalid() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();

        let forged = TokenCodec::new("another-signing-secret-entirely")
            .unwrap()
            .issue_at(user(), "alice", Vec::new(), now)
            .unwrap();
        let record = SessionRecord::issued(
            user(),
            forged.token.clone(),
            SessionOrigin::default(),
            now,
            now + Duration::hours(24),
        );
        block_on(async { (&sessions).insert(record).await }).unwrap();

        let err = block_on(gate.authenticate(&forged.token, now)).expect_err("must reject");
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn logout_revokes_only_the_calling_session() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();
        let first = login(&gate, now);
        let second = login(&gate, now);

        block_on(gate.logout(&first.session.id)).unwrap();

        assert!(matches!(
            block_on(gate.authenticate(&first.token, now)),
            Err(AuthError::TokenNotRecognized)
        ));
        assert!(block_on(gate.authenticate(&second.token, now)).is_ok());
    }

    #[test]
    fn logout_all_revokes_every_session() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();
        let first = login(&gate, now);
        let second = login(&gate, now);

        block_on(gate.logout_all(&user())).unwrap();

        for token in [&first.token, &second.token] {
            assert!(matches!(
                block_on(gate.authenticate(token, now)),
                Err(AuthError::TokenNotRecognized)
            ));
        }
        assert!(block_on(gate.active_sessions(&user(), now))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn revoke_rejects_foreign_sessions() {
        let sessions = TestSessions::default();
        let gate = gate(&sessions);
        let now = Utc::now();
        let issued = login(&gate, now);

        let other = UserId::try_from("user_2").unwrap();
        let err =
            block_on(gate.revoke(&other, &issued.session.id)).expect_err("must reject");
        assert!(matches!(err, Error::SessionNotFound { .. }));

        // Still live for the owner.
        assert!(block_on(gate.authenticate(&issued.token, now)).is_ok());
        block_on(gate.revoke(&user(), &issued.session.id)).unwrap();
        assert!(block_on(gate.authenticate(&issued.token, now)).is_err());
    }

    #[test]
    fn registry_failure_never_authenticates() {
        let sessions = TestSessions {
            fail: true,
            ..TestSessions::default()
        };
        let gate = gate(&sessions);

        let err =
            block_on(gate.authenticate("whatever", Utc::now())).expect_err("must fail closed");
        assert!(matches!(err, AuthError::Store(_)));
    }

    struct Sink<'a>(&'a Mutex<Vec<LoginAttempt>>);

    #[async_trait]
    impl crate::store::AuditStore for Sink<'_> {
        async fn append(
            &self,
            attempt: LoginAttempt,
        ) -> std::result::Result<(), crate::StoreError> {
            self.0.lock().expect("poisoned lock").push(attempt);
            Ok(())
        }

        async fn recent(
            &self,
            _limit: usize,
        ) -> std::result::Result<Vec<LoginAttempt>, crate::StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn login_and_failure_feed_the_audit_queue() {
        let sessions = TestSessions::default();
        let (recorder, queue) = audit_channel(4);
        let gate = AuthGateBuilder::new(TokenCodec::new(SECRET).unwrap(), &sessions)
            .audit(recorder)
            .build();

        block_on(gate.login(
            user(),
            "alice",
            Vec::new(),
            SessionOrigin::default(),
            Utc::now(),
        ))
        .unwrap();
        gate.record_failed_login(
            "mallory",
            SessionOrigin::default(),
            Utc::now(),
            "bad password",
        );
        drop(gate);

        let collected = Mutex::new(Vec::new());
        block_on(queue.drain(Sink(&collected)));

        let rows = collected.lock().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].outcome, crate::audit::LoginOutcome::Success);
        assert_eq!(rows[0].username, "alice");
        assert_eq!(rows[1].outcome, crate::audit::LoginOutcome::Failed);
    }
}
