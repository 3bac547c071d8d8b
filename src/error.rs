//! Application error types for storefront-auth
//!
//! One enum per layer: storage (`DbError`), principal directories
//! (`DirectoryError`) and the authentication boundary (`AuthError`).
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::models::Role;

/// Authentication and authorization errors
///
/// This is the only error type that crosses the login boundary and the
/// request gates. Lower-level failures are folded into `Internal`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Unknown contact or wrong secret (deliberately indistinguishable)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration with a contact identifier that is already in use
    #[error("Contact identifier is already registered")]
    DuplicateContact,

    /// Missing or unusable bearer token on a protected route
    #[error("Authentication required")]
    Unauthenticated,

    /// Token signature, shape or expiry check failed
    #[error("Invalid token")]
    InvalidToken,

    /// Authenticated, but the role is not allowed on this route
    #[error("Access denied: requires one of the following roles: {}", format_roles(.required))]
    Forbidden {
        /// Roles the route accepts (empty when no context was available)
        required: Vec<Role>,
    },

    /// Principal referenced by an authenticated context no longer exists
    #[error("Principal not found")]
    NotFound,

    /// Request failed validation before reaching the directories
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Too many failed login attempts from this client
    #[error("Rate limited: too many failed attempts")]
    RateLimited,

    /// Storage or crypto failure; details are logged, never returned
    #[error("Internal error")]
    Internal,
}

fn format_roles(roles: &[Role]) -> String {
    if roles.is_empty() {
        return "an authenticated role".to_string();
    }
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Principal directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No principal of this kind with the given id
    #[error("{role} with id {id} not found")]
    NotFound { role: Role, id: i64 },

    /// Unique constraint on the contact identifier was violated
    #[error("Contact identifier is already registered")]
    DuplicateContact,

    /// A create request arrived without a usable secret
    #[error("A non-empty secret is required")]
    MissingSecret,

    /// Hashing the secret failed
    #[error("Credential hashing failed: {0}")]
    Hash(#[from] crate::auth::HashError),

    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl From<DbError> for DirectoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConstraintViolation(_) => DirectoryError::DuplicateContact,
            other => DirectoryError::Storage(other),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Connection-level failure (closed worker, etc.)
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return DbError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| code.to_string()),
                );
            }
        }
        DbError::Sqlite(err)
    }
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => e.into(),
            other => DbError::Connection(other.to_string()),
        }
    }
}

/// Application-level error type
///
/// Aggregates the domain errors for the binary's startup path.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Directory error
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Telemetry setup error
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    /// HTTP server error
    #[error("Server error: {0}")]
    Server(#[from] crate::server::ServerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid credentials"
        );
        assert_eq!(AuthError::InvalidToken.to_string(), "Invalid token");
        assert_eq!(
            AuthError::Unauthenticated.to_string(),
            "Authentication required"
        );
        assert_eq!(
            AuthError::RateLimited.to_string(),
            "Rate limited: too many failed attempts"
        );
        assert_eq!(AuthError::Internal.to_string(), "Internal error");
    }

    #[test]
    fn test_forbidden_names_required_roles() {
        let err = AuthError::Forbidden {
            required: vec![Role::Admin, Role::Staff],
        };
        assert_eq!(
            err.to_string(),
            "Access denied: requires one of the following roles: admin, staff"
        );

        let err = AuthError::Forbidden { required: vec![] };
        assert!(err.to_string().contains("an authenticated role"));
    }

    #[test]
    fn test_constraint_violation_is_classified() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: 2067,
            },
            Some("UNIQUE constraint failed: customers.contact".to_string()),
        );
        let db_err: DbError = sqlite_err.into();

        match db_err {
            DbError::ConstraintViolation(msg) => assert!(msg.contains("customers.contact")),
            other => panic!("Expected ConstraintViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_other_sqlite_errors_stay_opaque() {
        let db_err: DbError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(db_err, DbError::Sqlite(_)));
    }

    #[test]
    fn test_directory_error_from_db_error() {
        let err: DirectoryError = DbError::ConstraintViolation("dup".to_string()).into();
        assert!(matches!(err, DirectoryError::DuplicateContact));

        let err: DirectoryError = DbError::Connection("closed".to_string()).into();
        assert!(matches!(err, DirectoryError::Storage(DbError::Connection(_))));
    }

    #[test]
    fn test_directory_not_found_message() {
        let err = DirectoryError::NotFound {
            role: Role::Staff,
            id: 7,
        };
        assert_eq!(err.to_string(), "staff with id 7 not found");
    }

    #[test]
    fn test_app_error_from_auth_error() {
        let app_err: AppError = AuthError::InvalidToken.into();
        assert_eq!(app_err.to_string(), "Authentication failed: Invalid token");
    }
}
