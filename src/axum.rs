//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::Utc;

use crate::error::Error;
use crate::gate::{AuthError, AuthGate, Principal};
use crate::matrix::{Access, PermissionMatrix};
use crate::store::{PermissionStore, SessionStore};
use crate::types::RoutePath;

use ::axum::Json;
use ::axum::body::Body;
use ::axum::extract::{FromRequestParts, MatchedPath};
use ::axum::http::header::AUTHORIZATION;
use ::axum::http::request::Parts;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};
use serde_json::json;

/// Rejection type with a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct AccessRejection {
    status: StatusCode,
    message: String,
}

impl AccessRejection {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }
}

impl From<AuthError> for AccessRejection {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
            // Generic 401 bodies; revoked and never-issued look identical.
            other => Self::new(StatusCode::UNAUTHORIZED, other.to_string()),
        }
    }
}

impl IntoResponse for AccessRejection {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Maps a crate error onto the HTTP status contract.
pub fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::Store(_) | Error::TokenEncoding(_) | Error::WeakSecret(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Error::InvalidId(_)
        | Error::InvalidRoute(_)
        | Error::ParentNotFound { .. }
        | Error::NodeHasChildren { .. }
        | Error::MenuCycleDetected { .. }
        | Error::MenuDepthExceeded { .. } => StatusCode::BAD_REQUEST,
        Error::EntryNotFound { .. }
        | Error::NodeNotFound { .. }
        | Error::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        Error::DuplicateEntry { .. } => StatusCode::CONFLICT,
    }
}

/// Converts a crate error into a JSON error response.
///
/// Persistence failures are logged and returned as an opaque 500.
pub fn error_response(error: &Error) -> Response {
    let status = error_status(error);
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::warn!(%error, "internal failure surfaced to client");
        "internal error".to_string()
    } else {
        error.to_string()
    };
    (status, Json(json!({ "error": message }))).into_response()
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = AccessRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(AccessRejection::unauthenticated)
    }
}

/// Middleware layer that authenticates requests through [`AuthGate`] and
/// attaches the resulting [`Principal`] to request extensions.
#[derive(Debug, Clone)]
pub struct AuthGateLayer<S> {
    gate: Arc<AuthGate<S>>,
}

impl<S> AuthGateLayer<S> {
    /// Creates a new authentication layer.
    pub fn new(gate: Arc<AuthGate<S>>) -> Self {
        Self { gate }
    }
}

impl<S, Inner> Layer<Inner> for AuthGateLayer<S>
where
    S: SessionStore,
{
    type Service = AuthGateService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AuthGateService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Middleware service backing [`AuthGateLayer`].
#[derive(Debug, Clone)]
pub struct AuthGateService<Inner, S> {
    inner: Inner,
    gate: Arc<AuthGate<S>>,
}

impl<Inner, S> Service<Request<Body>> for AuthGateService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: SessionStore + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());

            match gate.authenticate_header(header, Utc::now()).await {
                Ok(principal) => {
                    req.extensions_mut().insert(principal);
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Err(err) => Ok(AccessRejection::from(err).into_response()),
            }
        })
    }
}

/// Middleware layer that evaluates [`PermissionMatrix::check_access`] for the
/// authenticated principal against the resolved route template.
#[derive(Debug, Clone)]
pub struct RequireAccessLayer<P> {
    matrix: Arc<PermissionMatrix<P>>,
}

impl<P> RequireAccessLayer<P> {
    /// Creates a new access-check layer.
    pub fn new(matrix: Arc<PermissionMatrix<P>>) -> Self {
        Self { matrix }
    }
}

impl<P, Inner> Layer<Inner> for RequireAccessLayer<P>
where
    P: PermissionStore,
{
    type Service = RequireAccessService<Inner, P>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RequireAccessService {
            inner,
            matrix: self.matrix.clone(),
        }
    }
}

/// Middleware service backing [`RequireAccessLayer`].
#[derive(Debug, Clone)]
pub struct RequireAccessService<Inner, P> {
    inner: Inner,
    matrix: Arc<PermissionMatrix<P>>,
}

impl<Inner, P> Service<Request<Body>> for RequireAccessService<Inner, P>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    P: PermissionStore + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let matrix = self.matrix.clone();

        Box::pin(async move {
            let Some(principal) = req.extensions().get::<Principal>().cloned() else {
                return Ok(AccessRejection::unauthenticated().into_response());
            };

            // Decisions are made against the registered template, never the
            // substituted URL.
            let template = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched| matched.as_str().to_string())
                .unwrap_or_else(|| req.uri().path().to_string());
            let path = RoutePath::from_string(template);
            let method = req.method().clone();

            match matrix.check_access(&path, &method, &principal.roles).await {
                Ok(Access::Allow) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(Access::Forbidden) => Ok(AccessRejection::new(
                    StatusCode::FORBIDDEN,
                    "insufficient role",
                )
                .into_response()),
                Ok(Access::RouteUnknown) => Ok(AccessRejection::new(
                    StatusCode::NOT_FOUND,
                    "unknown route",
                )
                .into_response()),
                Err(error) => {
                    tracing::warn!(%error, "access check failed; denying request");
                    Ok(
                        AccessRejection::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
                            .into_response(),
                    )
                }
            }
        })
    }
}
