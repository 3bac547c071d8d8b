//! Authentication and authorization for storefront-auth
//!
//! - Credential hashing (Argon2id)
//! - Bearer token issuing and validation (HS256 JWT)
//! - Login coordination across the customer, staff and admin directories
//! - Request gates (authentication, then role)
//! - Throttling of failed logins

pub mod coordinator;
pub mod gate;
pub mod hasher;
pub mod ratelimit;
pub mod token;

pub use coordinator::{LoginCoordinator, LoginScope};
pub use gate::{extract_bearer, AuthenticationGate, RoleGate, RoutePolicy};
pub use hasher::{Argon2Hasher, CredentialHasher, HashError, HasherConfig, DIGEST_PREFIX};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use token::{TokenService, DEFAULT_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS};
