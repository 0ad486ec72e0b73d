//! Best-effort login auditing.
//!
//! Attempts are pushed onto a bounded queue and drained by a worker the host
//! spawns. Recording never blocks the login path: when the queue is full the
//! attempt is dropped and counted. Sink failures are logged and swallowed;
//! auditing is the one place this crate fails open.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::session::SessionOrigin;
use crate::store::AuditStore;
use crate::types::UserId;

/// Outcome of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LoginOutcome {
    /// Credentials accepted, session issued.
    #[serde(rename = "SUCCESS")]
    Success,
    /// Credentials rejected.
    #[serde(rename = "FAILED")]
    Failed,
}

/// One recorded login attempt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LoginAttempt {
    /// Attempt identifier.
    pub id: String,
    /// Resolved user, absent when the attempt failed before identification.
    pub user: Option<UserId>,
    /// Username as presented by the caller.
    pub username: String,
    /// Client metadata.
    pub origin: SessionOrigin,
    /// Attempt instant.
    pub at: DateTime<Utc>,
    /// Success or failure.
    pub outcome: LoginOutcome,
    /// Optional failure detail.
    pub message: Option<String>,
}

impl LoginAttempt {
    /// Records a successful login.
    pub fn success(
        user: UserId,
        username: impl Into<String>,
        origin: SessionOrigin,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user: Some(user),
            username: username.into(),
            origin,
            at,
            outcome: LoginOutcome::Success,
            message: None,
        }
    }

    /// Records a failed login.
    pub fn failed(
        username: impl Into<String>,
        origin: SessionOrigin,
        at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user: None,
            username: username.into(),
            origin,
            at,
            outcome: LoginOutcome::Failed,
            message: Some(message.into()),
        }
    }
}

/// Creates a bounded audit channel.
///
/// The recorder side is cheap to clone; the queue side is consumed by
/// [`AuditQueue::drain`].
pub fn audit_channel(capacity: usize) -> (AuditRecorder, AuditQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let recorder = AuditRecorder {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (recorder, AuditQueue { rx })
}

/// Non-blocking producer handle for login attempts.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<LoginAttempt>,
    dropped: Arc<AtomicU64>,
}

impl AuditRecorder {
    /// Enqueues an attempt; drops it (and counts the drop) when the queue is
    /// full or the drain worker is gone.
    pub fn record(&self, attempt: LoginAttempt) {
        if self.tx.try_send(attempt).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped = total, "audit queue full; login attempt dropped");
        }
    }

    /// Returns how many attempts have been dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side of the audit channel.
pub struct AuditQueue {
    rx: mpsc::Receiver<LoginAttempt>,
}

impl AuditQueue {
    /// Drains attempts into the store until every recorder is dropped.
    ///
    /// Sink failures are logged and otherwise ignored; they never surface to
    /// the login path.
    pub async fn drain<A: AuditStore>(mut self, store: A) {
        while let Some(attempt) = self.rx.recv().await {
            if let Err(error) = store.append(attempt).await {
                tracing::warn!(%error, "failed to persist login attempt");
            }
        }
    }
}
