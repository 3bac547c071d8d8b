//! Request gates
//!
//! Every guarded route carries a [`RoutePolicy`] fixed at router build time.
//! The [`AuthenticationGate`] turns the `Authorization` header into an
//! [`AuthContext`] and the [`RoleGate`] then checks the context's role
//! against the policy. Both are pure: no storage lookups happen here.

use std::sync::Arc;

use crate::auth::token::TokenService;
use crate::error::AuthError;
use crate::models::{AuthContext, Role};

/// Per-route access declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Skip authentication entirely
    pub public: bool,

    /// Roles allowed on the route; empty means any authenticated role
    pub required_roles: Vec<Role>,
}

impl RoutePolicy {
    /// Open to anonymous callers
    pub fn public() -> Self {
        Self {
            public: true,
            required_roles: Vec::new(),
        }
    }

    /// Any authenticated principal
    pub fn protected() -> Self {
        Self::default()
    }

    /// Authenticated principals holding one of `roles`
    pub fn require_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut required_roles: Vec<Role> = roles.into_iter().collect();
        required_roles.sort();
        required_roles.dedup();
        Self {
            public: false,
            required_roles,
        }
    }

    /// Mark a policy public when its route group is public
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = self.public || public;
        self
    }
}

/// First gate: bearer token to authenticated context
#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    tokens: Arc<TokenService>,
}

impl AuthenticationGate {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// `Ok(None)` for public routes, `Ok(Some(ctx))` for a valid bearer token
    pub fn check(
        &self,
        policy: &RoutePolicy,
        authorization: Option<&str>,
    ) -> Result<Option<AuthContext>, AuthError> {
        if policy.public {
            return Ok(None);
        }

        let token = authorization
            .and_then(extract_bearer)
            .ok_or(AuthError::Unauthenticated)?;

        self.tokens
            .validate(token)
            .map(|claims| Some(AuthContext::from(claims)))
            .map_err(|_| AuthError::Unauthenticated)
    }
}

/// Pull the token out of a `Bearer <token>` header value
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Second gate: role membership
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleGate;

impl RoleGate {
    pub fn new() -> Self {
        Self
    }

    /// Plain membership; no role implies another
    pub fn check(&self, policy: &RoutePolicy, context: Option<&AuthContext>) -> Result<(), AuthError> {
        if policy.required_roles.is_empty() {
            return Ok(());
        }

        let forbidden = || AuthError::Forbidden {
            required: policy.required_roles.clone(),
        };

        let context = context.ok_or_else(|| {
            tracing::warn!("Role gate reached without an authenticated context");
            forbidden()
        })?;

        if policy.required_roles.contains(&context.role) {
            Ok(())
        } else {
            Err(forbidden())
        }
    }
}
