//! HTTP middleware for storefront-auth
//!
//! - Per-route guard running the authentication gate, then the role gate
//! - Error responses for the authentication taxonomy
//! - Request logging and tracing spans

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticationGate, RoleGate, RoutePolicy};
use crate::error::AuthError;
use crate::models::Role;
use crate::telemetry::AuthMetrics;

/// Middleware state for one registered route
#[derive(Clone)]
pub struct RouteGuard {
    gate: Arc<AuthenticationGate>,
    roles: RoleGate,
    policy: Arc<RoutePolicy>,
    metrics: AuthMetrics,
}

impl RouteGuard {
    pub fn new(gate: Arc<AuthenticationGate>, policy: RoutePolicy, metrics: AuthMetrics) -> Self {
        Self {
            gate,
            roles: RoleGate::new(),
            policy: Arc::new(policy),
            metrics,
        }
    }
}

/// Run both gates and attach the [`AuthContext`](crate::models::AuthContext)
/// to the request extensions
///
/// Rejections happen before the handler runs.
pub async fn guard_middleware(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let context = guard
        .gate
        .check(&guard.policy, authorization)
        .map_err(|e| {
            tracing::info!(path = %request.uri().path(), "Request rejected: not authenticated");
            guard.metrics.record_rejection("authentication", "unauthenticated");
            e
        })?;

    guard
        .roles
        .check(&guard.policy, context.as_ref())
        .map_err(|e| {
            tracing::info!(
                path = %request.uri().path(),
                role = ?context.map(|c| c.role),
                "Request rejected: role not permitted"
            );
            guard.metrics.record_rejection("role", "forbidden");
            e
        })?;

    if let Some(context) = context {
        request.extensions_mut().insert(context);
    }

    Ok(next.run(request).await)
}

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_roles: Option<Vec<Role>>,
}

/// Error response for handlers and the guard
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.body.error
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.into(),
                required_roles: None,
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match &error {
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::DuplicateContact => StatusCode::CONFLICT,
            AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let required_roles = match &error {
            AuthError::Forbidden { required } => Some(required.clone()),
            _ => None,
        };

        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                required_roles,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Logs method, path, status and latency for every request
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

/// Wraps the request in an `http_request` span
pub async fn tracing_middleware(request: Request, next: Next) -> Response {
    use tracing::Instrument;

    let span = tracing::info_span!(
        "http_request",
        http.method = %request.method(),
        http.url = %request.uri(),
        http.status_code = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;
        tracing::Span::current().record("http.status_code", response.status().as_u16());
        response
    }
    .instrument(span)
    .await
}
