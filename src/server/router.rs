//! HTTP router for storefront-auth
//!
//! Routes are registered through [`RouteGroup`], which attaches a guard
//! carrying the route's [`RoutePolicy`]. Provides:
//! - Health check
//! - Registration, the three login scopes and the caller's profile
//! - Administrative endpoints over the customer, staff and admin directories

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put, MethodRouter},
    Extension, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticationGate, LoginCoordinator, LoginScope, RoutePolicy};
use crate::directory::Database;
use crate::error::AuthError;
use crate::models::{
    AuthContext, LoginRequest, LoginResponse, NewPrincipal, Principal, PrincipalPatch,
    RegisterRequest, RegisterResponse, Role,
};
use crate::telemetry::AuthMetrics;

use super::middleware::{guard_middleware, ApiError, RouteGuard};

/// Shared application state
pub struct AppState<D: Database> {
    /// Login, registration and directory administration
    pub coordinator: Arc<LoginCoordinator<D>>,

    /// Authentication gate shared by every route guard
    pub gate: Arc<AuthenticationGate>,

    pub metrics: AuthMetrics,
}

impl<D: Database> AppState<D> {
    pub fn new(coordinator: LoginCoordinator<D>, metrics: AuthMetrics) -> Self {
        let gate = Arc::new(AuthenticationGate::new(coordinator.token_service()));
        Self {
            coordinator: Arc::new(coordinator),
            gate,
            metrics,
        }
    }
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            gate: Arc::clone(&self.gate),
            metrics: self.metrics.clone(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Routes sharing a public/protected tag
///
/// A public group makes every route in it public regardless of the
/// route's own policy.
pub struct RouteGroup<D: Database + 'static> {
    state: AppState<D>,
    public: bool,
    router: Router<AppState<D>>,
}

impl<D: Database + 'static> RouteGroup<D> {
    pub fn public(state: &AppState<D>) -> Self {
        Self::with_tag(state, true)
    }

    pub fn protected(state: &AppState<D>) -> Self {
        Self::with_tag(state, false)
    }

    fn with_tag(state: &AppState<D>, public: bool) -> Self {
        Self {
            state: state.clone(),
            public,
            router: Router::new(),
        }
    }

    /// Register `method_router` at `path` behind a guard for `policy`
    pub fn route(
        mut self,
        path: &str,
        policy: RoutePolicy,
        method_router: MethodRouter<AppState<D>>,
    ) -> Self {
        let guard = RouteGuard::new(
            Arc::clone(&self.state.gate),
            policy.with_public(self.public),
            self.state.metrics.clone(),
        );
        self.router = self.router.route(
            path,
            method_router.route_layer(from_fn_with_state(guard, guard_middleware)),
        );
        self
    }

    pub fn into_router(self) -> Router<AppState<D>> {
        self.router
    }
}

/// Who may do what on one directory's administrative endpoints
#[derive(Debug, Clone)]
struct DirectoryAccess {
    read: RoutePolicy,
    create: RoutePolicy,
    update: RoutePolicy,
    delete: RoutePolicy,
}

impl DirectoryAccess {
    fn for_role(role: Role) -> Self {
        let admin_only = RoutePolicy::require_roles([Role::Admin]);
        let back_office = RoutePolicy::require_roles([Role::Admin, Role::Staff]);

        match role {
            Role::Admin => Self {
                read: admin_only.clone(),
                create: admin_only.clone(),
                update: admin_only.clone(),
                delete: admin_only,
            },
            Role::Staff => Self {
                read: back_office,
                create: admin_only.clone(),
                update: admin_only.clone(),
                delete: admin_only,
            },
            Role::Customer => Self {
                read: back_office.clone(),
                create: admin_only.clone(),
                update: back_office,
                delete: admin_only,
            },
        }
    }
}

/// Build the main application router
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    let public = RouteGroup::public(&state)
        .route("/health", RoutePolicy::public(), get(health_handler))
        .route(
            "/auth/register/customer",
            RoutePolicy::public(),
            post(register_customer_handler::<D>),
        )
        .route("/auth/login", RoutePolicy::public(), post(login_handler::<D>))
        .route(
            "/auth/login/admin",
            RoutePolicy::public(),
            post(login_admin_handler::<D>),
        )
        .route(
            "/auth/login/staff",
            RoutePolicy::public(),
            post(login_staff_handler::<D>),
        );

    let mut protected = RouteGroup::protected(&state).route(
        "/auth/me",
        RoutePolicy::protected(),
        get(profile_handler::<D>),
    );

    for (base, role) in [
        ("/api/administrators", Role::Admin),
        ("/api/staff", Role::Staff),
        ("/api/customers", Role::Customer),
    ] {
        protected = directory_routes(protected, base, role);
    }

    Router::new()
        .merge(public.into_router())
        .merge(protected.into_router())
        .with_state(state)
}

/// List/create on `base`, get/update/delete on `base/:id`
fn directory_routes<D: Database + 'static>(
    group: RouteGroup<D>,
    base: &str,
    role: Role,
) -> RouteGroup<D> {
    let access = DirectoryAccess::for_role(role);
    let item = format!("{}/:id", base);

    group
        .route(
            base,
            access.read.clone(),
            get(move |State(state): State<AppState<D>>| async move {
                list_principals(&state, role).await
            }),
        )
        .route(
            base,
            access.create,
            post(
                move |State(state): State<AppState<D>>,
                      body: Result<Json<NewPrincipal>, JsonRejection>| async move {
                    create_principal(&state, role, body).await
                },
            ),
        )
        .route(
            &item,
            access.read,
            get(
                move |State(state): State<AppState<D>>, Path(id): Path<i64>| async move {
                    get_principal(&state, role, id).await
                },
            ),
        )
        .route(
            &item,
            access.update,
            put(
                move |State(state): State<AppState<D>>,
                      Path(id): Path<i64>,
                      body: Result<Json<PrincipalPatch>, JsonRejection>| async move {
                    update_principal(&state, role, id, body).await
                },
            ),
        )
        .route(
            &item,
            access.delete,
            delete(
                move |State(state): State<AppState<D>>, Path(id): Path<i64>| async move {
                    delete_principal(&state, role, id).await
                },
            ),
        )
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

// =============================================================================
// Health
// =============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Registration, login and profile
// =============================================================================

async fn register_customer_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    let principal = state.coordinator.register_customer(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Customer registered successfully".to_string(),
            principal,
        }),
    ))
}

async fn login_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    scoped_login(&state, LoginScope::General, peer, body).await
}

async fn login_admin_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    scoped_login(&state, LoginScope::Admin, peer, body).await
}

async fn login_staff_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    scoped_login(&state, LoginScope::Staff, peer, body).await
}

async fn scoped_login<D: Database + 'static>(
    state: &AppState<D>,
    scope: LoginScope,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = json_body(body)?;
    let ip = peer.map(|ConnectInfo(addr)| addr.ip());

    let result = state.coordinator.login_scoped(scope, &request, ip).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(AuthError::InvalidCredentials) => "invalid_credentials",
        Err(AuthError::RateLimited) => "rate_limited",
        Err(_) => "error",
    };
    state.metrics.record_login(scope.as_str(), outcome);

    Ok(Json(result?))
}

async fn profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<Principal>, ApiError> {
    let principal = state.coordinator.resolve_profile(&context).await?;
    Ok(Json(principal))
}

// =============================================================================
// Directory administration
// =============================================================================

async fn list_principals<D: Database + 'static>(
    state: &AppState<D>,
    role: Role,
) -> Result<Json<Vec<Principal>>, ApiError> {
    let principals = state.coordinator.list_principals(role).await?;
    Ok(Json(principals))
}

async fn create_principal<D: Database + 'static>(
    state: &AppState<D>,
    role: Role,
    body: Result<Json<NewPrincipal>, JsonRejection>,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    let new = json_body(body)?;
    let principal = state.coordinator.create_principal(role, new).await?;
    Ok((StatusCode::CREATED, Json(principal)))
}

async fn get_principal<D: Database + 'static>(
    state: &AppState<D>,
    role: Role,
    id: i64,
) -> Result<Json<Principal>, ApiError> {
    let principal = state.coordinator.get_principal(role, id).await?;
    Ok(Json(principal))
}

async fn update_principal<D: Database + 'static>(
    state: &AppState<D>,
    role: Role,
    id: i64,
    body: Result<Json<PrincipalPatch>, JsonRejection>,
) -> Result<Json<Principal>, ApiError> {
    let patch = json_body(body)?;
    let principal = state.coordinator.update_principal(role, id, patch).await?;
    Ok(Json(principal))
}

async fn delete_principal<D: Database + 'static>(
    state: &AppState<D>,
    role: Role,
    id: i64,
) -> Result<StatusCode, ApiError> {
    state.coordinator.remove_principal(role, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
