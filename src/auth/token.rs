//! Bearer token issuing and validation
//!
//! Tokens are HS256 JSON Web Tokens carrying `{id, role, iat, exp}`. They are
//! stateless: nothing is stored server-side and there is no revocation list,
//! so a token stays valid until `exp` even if its principal is deactivated.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::models::{Claims, Role};

/// Default token lifetime in seconds
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Longest accepted token lifetime (one year)
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

/// Wire form of the claims
#[derive(Debug, Serialize, Deserialize)]
struct TokenBody {
    id: i64,
    role: Role,
    iat: i64,
    exp: i64,
}

/// Signs and validates bearer tokens with a shared HMAC secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Sign a token for the claims, valid from now for the configured TTL
    pub fn issue(&self, claims: Claims) -> Result<String, AuthError> {
        self.issue_at(claims, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        claims: Claims,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let iat = issued_at.timestamp();
        let exp = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or_else(|| {
                tracing::error!(ttl_secs = self.ttl_secs, "Token lifetime out of range");
                AuthError::Internal
            })?;
        let body = TokenBody {
            id: claims.id,
            role: claims.role,
            iat,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &body, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign token");
            AuthError::Internal
        })
    }

    /// Verify signature and expiry, returning the embedded claims
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<TokenBody>(token, &self.decoding_key, &self.validation)
            .map(|data| Claims::new(data.claims.id, data.claims.role))
            .map_err(|e| {
                tracing::debug!(reason = %e, "Token rejected");
                AuthError::InvalidToken
            })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn test_issue_then_validate_returns_claims() {
        let service = TokenService::new(SECRET, 3600);
        for role in Role::ALL {
            let claims = Claims::new(42, role);
            let token = service.issue(claims).unwrap();
            assert_eq!(service.validate(&token).unwrap(), claims);
        }
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = TokenService::new(SECRET, 60);
        let token = service
            .issue_at(Claims::new(1, Role::Customer), Utc::now() - Duration::seconds(120))
            .unwrap();

        assert_eq!(service.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_out_of_range_ttl_fails_to_issue() {
        let service = TokenService::new(SECRET, u64::MAX);
        assert_eq!(
            service.issue(Claims::new(1, Role::Customer)),
            Err(AuthError::Internal)
        );

        let service = TokenService::new(SECRET, MAX_TOKEN_TTL_SECS);
        let token = service.issue(Claims::new(1, Role::Customer)).unwrap();
        assert!(service.validate(&token).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenService::new("secret-a", 3600);
        let verifier = TokenService::new("secret-b", 3600);
        let token = issuer.issue(Claims::new(1, Role::Admin)).unwrap();

        assert_eq!(verifier.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let service = TokenService::new(SECRET, 3600);
        assert_eq!(
            service.validate("invalid.token.here"),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(service.validate(""), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let service = TokenService::new(SECRET, 3600);
        let token = service.issue(Claims::new(1, Role::Customer)).unwrap();

        // Swap in the payload of an admin token signed with another key
        let forged = TokenService::new("attacker", 3600)
            .issue(Claims::new(1, Role::Admin))
            .unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        parts[1] = forged_parts[1];

        assert_eq!(
            service.validate(&parts.join(".")),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_unknown_role_rejected() {
        #[derive(Serialize)]
        struct Raw {
            id: i64,
            role: &'static str,
            iat: i64,
            exp: i64,
        }
        let now = Utc::now().timestamp();
        let raw = Raw {
            id: 1,
            role: "superuser",
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &raw,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let service = TokenService::new(SECRET, 3600);
        assert_eq!(service.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_debug_hides_keys() {
        let output = format!("{:?}", TokenService::new(SECRET, 3600));
        assert!(!output.contains(SECRET));
        assert!(output.contains("3600"));
    }
}
