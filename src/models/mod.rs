//! Domain models for storefront-auth
//!
//! This module contains the core domain models used throughout the application.

pub mod login;
pub mod principal;

// Re-export commonly used types
pub use login::{
    AuthContext, Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
pub use principal::{
    CredentialRecord, NewPrincipal, NewPrincipalRecord, Principal, PrincipalChanges,
    PrincipalPatch, Role,
};
