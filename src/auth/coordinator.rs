//! Login coordinator
//!
//! Owns the three principal directories and drives every credential
//! check: the general customer-or-staff login, the admin- and
//! staff-scoped logins, customer self-registration and the
//! administrative create/update/delete paths that must keep contact
//! identifiers unique across the customer and staff directories.

use std::net::IpAddr;
use std::sync::Arc;

use crate::directory::{Database, PrincipalDirectory};
use crate::error::{AuthError, DirectoryError};
use crate::models::{
    AuthContext, Claims, LoginRequest, LoginResponse, NewPrincipal, Principal, PrincipalPatch,
    RegisterRequest, Role,
};

use super::hasher::CredentialHasher;
use super::ratelimit::{RateLimitConfig, RateLimiter};
use super::token::TokenService;

/// Which directories a login attempt may match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginScope {
    /// Customer first, then staff
    General,
    Admin,
    Staff,
}

impl LoginScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginScope::General => "general",
            LoginScope::Admin => "admin",
            LoginScope::Staff => "staff",
        }
    }

    /// Directories tried, in order
    pub fn roles(&self) -> &'static [Role] {
        match self {
            LoginScope::General => &[Role::Customer, Role::Staff],
            LoginScope::Admin => &[Role::Admin],
            LoginScope::Staff => &[Role::Staff],
        }
    }
}

impl std::fmt::Display for LoginScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified against when a contact has no principal, so unknown contacts
/// cost one hash verification like a wrong secret does
const PLACEHOLDER_SECRET: &str = "placeholder-secret-for-unknown-contacts";

/// Login, registration and principal administration
pub struct LoginCoordinator<D: Database> {
    customers: PrincipalDirectory<D>,
    staff: PrincipalDirectory<D>,
    admins: PrincipalDirectory<D>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<TokenService>,
    placeholder_digest: Option<String>,
    rate_limiter: Option<RateLimiter>,
}

impl<D: Database> LoginCoordinator<D> {
    /// Build a coordinator over `db`
    ///
    /// Failed-login throttling is off unless `rate_limit` is given.
    pub fn new(
        db: Arc<D>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<TokenService>,
        rate_limit: Option<RateLimitConfig>,
    ) -> Self {
        let placeholder_digest = match hasher.hash(PLACEHOLDER_SECRET) {
            Ok(digest) => Some(digest),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to prepare placeholder digest");
                None
            }
        };

        Self {
            customers: PrincipalDirectory::new(db.clone(), Role::Customer, hasher.clone()),
            staff: PrincipalDirectory::new(db.clone(), Role::Staff, hasher.clone()),
            admins: PrincipalDirectory::new(db, Role::Admin, hasher.clone()),
            hasher,
            tokens,
            placeholder_digest,
            rate_limiter: rate_limit.map(RateLimiter::new),
        }
    }

    /// Directory holding principals of `role`
    pub fn directory(&self, role: Role) -> &PrincipalDirectory<D> {
        match role {
            Role::Customer => &self.customers,
            Role::Staff => &self.staff,
            Role::Admin => &self.admins,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Shared handle to the token service, for the request gates
    pub fn token_service(&self) -> Arc<TokenService> {
        Arc::clone(&self.tokens)
    }

    /// Failed-login throttle, when enabled
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    /// Customer-or-staff login
    pub async fn login(
        &self,
        request: &LoginRequest,
        ip: Option<IpAddr>,
    ) -> Result<LoginResponse, AuthError> {
        self.login_scoped(LoginScope::General, request, ip).await
    }

    /// Administrator-only login
    pub async fn login_admin(
        &self,
        request: &LoginRequest,
        ip: Option<IpAddr>,
    ) -> Result<LoginResponse, AuthError> {
        self.login_scoped(LoginScope::Admin, request, ip).await
    }

    /// Staff-only login
    pub async fn login_staff(
        &self,
        request: &LoginRequest,
        ip: Option<IpAddr>,
    ) -> Result<LoginResponse, AuthError> {
        self.login_scoped(LoginScope::Staff, request, ip).await
    }

    /// Try each directory of the scope in order and issue a token for the
    /// first principal whose credentials verify
    ///
    /// Unknown contact, wrong secret and inactive principal all fail with
    /// the same `InvalidCredentials`.
    pub async fn login_scoped(
        &self,
        scope: LoginScope,
        request: &LoginRequest,
        ip: Option<IpAddr>,
    ) -> Result<LoginResponse, AuthError> {
        let throttle = ip.zip(self.rate_limiter.as_ref());

        if let Some((ip, limiter)) = throttle {
            if limiter.is_blocked(ip) {
                tracing::warn!(%ip, %scope, "Login rejected: client is rate limited");
                return Err(AuthError::RateLimited);
            }
        }

        for role in scope.roles() {
            if let Some(principal) = self.match_credentials(*role, request).await? {
                if let Some((ip, limiter)) = throttle {
                    limiter.reset(ip);
                }
                return self.issue_login(principal);
            }
        }

        if let Some((ip, limiter)) = throttle {
            if limiter.record_failure(ip) {
                tracing::warn!(%ip, "Client locked out after repeated login failures");
            }
        }
        tracing::info!(%scope, "Login failed: invalid credentials");
        tracing::debug!(%scope, contact = %request.contact, "Rejected login contact");
        Err(AuthError::InvalidCredentials)
    }

    async fn match_credentials(
        &self,
        role: Role,
        request: &LoginRequest,
    ) -> Result<Option<Principal>, AuthError> {
        let record = self
            .directory(role)
            .find_by_contact_with_credential(&request.contact)
            .await
            .map_err(directory_failure)?;

        let Some(record) = record else {
            if let Some(digest) = &self.placeholder_digest {
                self.hasher.verify(digest, &request.secret);
            }
            return Ok(None);
        };

        if !self.hasher.verify(&record.digest, &request.secret) {
            return Ok(None);
        }

        if !record.principal.active {
            tracing::info!(%role, id = record.principal.id, "Login refused for inactive principal");
            return Ok(None);
        }

        Ok(Some(record.principal))
    }

    fn issue_login(&self, principal: Principal) -> Result<LoginResponse, AuthError> {
        let role = principal.role;
        let token = self.tokens.issue(Claims::new(principal.id, role))?;

        tracing::info!(%role, id = principal.id, "Login succeeded");

        Ok(LoginResponse {
            message: format!("{} login successful", role.label()),
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl_secs(),
            role,
            principal,
        })
    }

    /// Customer self-registration
    pub async fn register_customer(&self, request: RegisterRequest) -> Result<Principal, AuthError> {
        let new = NewPrincipal {
            name: request.name,
            contact: request.contact,
            secret: request.secret,
            phone: request.phone,
            address: request.address,
            position: None,
            active: true,
        };
        let principal = self.create_principal(Role::Customer, new).await?;
        tracing::info!(id = principal.id, "Customer registered");
        Ok(principal)
    }

    /// Create a principal of any kind
    ///
    /// Customer and staff contacts must not collide with each other, so the
    /// general login can never match two principals. The lookup here only
    /// gives an early answer; storage enforces the shared namespace.
    pub async fn create_principal(
        &self,
        role: Role,
        new: NewPrincipal,
    ) -> Result<Principal, AuthError> {
        validate_new(&new)?;
        self.ensure_contact_available(role, &new.contact, None).await?;

        self.directory(role)
            .create(new)
            .await
            .map_err(directory_failure)
    }

    pub async fn update_principal(
        &self,
        role: Role,
        id: i64,
        patch: PrincipalPatch,
    ) -> Result<Principal, AuthError> {
        if let Some(contact) = patch.contact.as_deref() {
            if contact.trim().is_empty() {
                return Err(AuthError::InvalidRequest("contact must not be empty".into()));
            }
            self.ensure_contact_available(role, contact, Some(id)).await?;
        }

        self.directory(role)
            .update(id, patch)
            .await
            .map_err(directory_failure)
    }

    pub async fn remove_principal(&self, role: Role, id: i64) -> Result<(), AuthError> {
        self.directory(role).remove(id).await.map_err(directory_failure)
    }

    pub async fn get_principal(&self, role: Role, id: i64) -> Result<Principal, AuthError> {
        self.directory(role).find_by_id(id).await.map_err(directory_failure)
    }

    pub async fn list_principals(&self, role: Role) -> Result<Vec<Principal>, AuthError> {
        self.directory(role).list().await.map_err(directory_failure)
    }

    /// Load the caller's own principal from the directory its token names
    pub async fn resolve_profile(&self, context: &AuthContext) -> Result<Principal, AuthError> {
        self.get_principal(context.role, context.id).await
    }

    /// Seed an administrator unless one with that contact already exists
    ///
    /// Returns `true` when a new administrator was created.
    pub async fn ensure_bootstrap_admin(&self, admin: NewPrincipal) -> Result<bool, AuthError> {
        let existing = self
            .admins
            .find_by_contact(&admin.contact)
            .await
            .map_err(directory_failure)?;

        if existing.is_some() {
            tracing::debug!("Bootstrap administrator already present");
            return Ok(false);
        }

        let created = self.create_principal(Role::Admin, admin).await?;
        tracing::info!(id = created.id, "Bootstrap administrator created");
        Ok(true)
    }

    async fn ensure_contact_available(
        &self,
        role: Role,
        contact: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), AuthError> {
        let shared: &[Role] = match role {
            Role::Customer | Role::Staff => &[Role::Customer, Role::Staff],
            Role::Admin => &[Role::Admin],
        };

        for other in shared {
            let existing = self
                .directory(*other)
                .find_by_contact(contact)
                .await
                .map_err(directory_failure)?;

            if let Some(existing) = existing {
                let is_self = *other == role && Some(existing.id) == exclude_id;
                if !is_self {
                    tracing::info!(%role, conflicting = %other, "Contact identifier already in use");
                    return Err(AuthError::DuplicateContact);
                }
            }
        }
        Ok(())
    }
}

fn validate_new(new: &NewPrincipal) -> Result<(), AuthError> {
    if new.name.trim().is_empty() {
        return Err(AuthError::InvalidRequest("name must not be empty".into()));
    }
    if new.contact.trim().is_empty() {
        return Err(AuthError::InvalidRequest("contact must not be empty".into()));
    }
    if new.secret.is_empty() {
        return Err(AuthError::InvalidRequest("secret must not be empty".into()));
    }
    Ok(())
}

/// Fold a directory failure into the boundary taxonomy; storage and hashing
/// detail is logged here and never returned
fn directory_failure(err: DirectoryError) -> AuthError {
    match err {
        DirectoryError::NotFound { .. } => AuthError::NotFound,
        DirectoryError::DuplicateContact => AuthError::DuplicateContact,
        DirectoryError::MissingSecret => {
            AuthError::InvalidRequest("secret must not be empty".into())
        }
        DirectoryError::Hash(e) => {
            tracing::error!(error = %e, "Credential hashing failed");
            AuthError::Internal
        }
        DirectoryError::Storage(e) => {
            tracing::error!(error = %e, "Directory storage failure");
            AuthError::Internal
        }
    }
}
