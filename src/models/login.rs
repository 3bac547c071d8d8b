//! Login, registration and token claim models

use std::fmt;

use serde::{Deserialize, Serialize};

use super::principal::{Principal, Role};

/// Contact identifier + plaintext secret; never persisted
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub contact: String,

    #[serde(alias = "password")]
    pub secret: String,
}

impl LoginRequest {
    pub fn new(contact: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            contact: contact.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("contact", &self.contact)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Successful login result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,

    /// Signed bearer token
    pub token: String,

    /// Always "Bearer"
    pub token_type: String,

    /// Token lifetime in seconds
    pub expires_in: u64,

    pub role: Role,

    /// The authenticated principal (digest stripped)
    pub principal: Principal,
}

/// Customer self-registration payload
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,

    #[serde(alias = "email")]
    pub contact: String,

    #[serde(alias = "password")]
    pub secret: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub address: Option<String>,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        contact: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            contact: contact.into(),
            secret: secret.into(),
            phone: None,
            address: None,
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("contact", &self.contact)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Registration result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub principal: Principal,
}

/// Claims carried by a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id within the role's directory
    pub id: i64,
    pub role: Role,
}

impl Claims {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}

/// Per-request identity attached by the authentication gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub id: i64,
    pub role: Role,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            role: claims.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_debug_hides_secret() {
        let req = LoginRequest::new("a@x.com", "hunter2");
        let output = format!("{:?}", req);
        assert!(output.contains("a@x.com"));
        assert!(!output.contains("hunter2"));
    }

    #[test]
    fn test_register_request_aliases() {
        let body = r#"{"name":"Carlos","email":"c@x.com","password":"123456","phone":"300"}"#;
        let req: RegisterRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.contact, "c@x.com");
        assert_eq!(req.secret, "123456");
        assert_eq!(req.phone.as_deref(), Some("300"));
        assert!(req.address.is_none());
    }

    #[test]
    fn test_auth_context_from_claims() {
        let ctx: AuthContext = Claims::new(4, Role::Staff).into();
        assert_eq!(ctx.id, 4);
        assert_eq!(ctx.role, Role::Staff);
    }
}
