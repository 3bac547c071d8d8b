//! Principal-related domain models
//!
//! A principal is anything that can authenticate: a customer, a staff
//! member or an administrator. The credential digest never lives on
//! [`Principal`]; it only travels inside [`CredentialRecord`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tag, implied by the directory a principal was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    /// All roles, in general-login lookup order followed by admin
    pub const ALL: [Role; 3] = [Role::Customer, Role::Staff, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Human-readable label used in login responses
    pub fn label(&self) -> &'static str {
        match self {
            Role::Customer => "Customer",
            Role::Staff => "Staff",
            Role::Admin => "Administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A principal as returned to callers (never includes the digest)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique numeric identity within its directory
    pub id: i64,

    /// Which directory the principal belongs to
    pub role: Role,

    /// Display name
    pub name: String,

    /// Unique contact identifier (email)
    pub contact: String,

    /// Phone number (customer profile)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Postal address (customer profile)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Job title (staff profile)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    /// Inactive principals cannot log in
    pub active: bool,

    /// When the principal was created
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A principal together with its credential digest
///
/// Produced only by the credential-inclusive lookup used at login.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub principal: Principal,
    pub digest: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("principal", &self.principal)
            .field("digest", &"<redacted>")
            .finish()
    }
}

/// Request to create a principal in any directory
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPrincipal {
    pub name: String,

    #[serde(alias = "email")]
    pub contact: String,

    /// Plaintext secret, or an existing digest (kept as is)
    #[serde(alias = "password")]
    pub secret: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub position: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewPrincipal {
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
            position: None,
            active: true,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl fmt::Debug for NewPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPrincipal")
            .field("name", &self.name)
            .field("contact", &self.contact)
            .field("secret", &"<redacted>")
            .field("active", &self.active)
            .finish()
    }
}

/// Partial update of a principal; absent fields are left untouched
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalPatch {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "email")]
    pub contact: Option<String>,

    /// New plaintext secret; absent or empty keeps the stored digest
    #[serde(default, alias = "password")]
    pub secret: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub position: Option<String>,

    #[serde(default)]
    pub active: Option<bool>,
}

impl PrincipalPatch {
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

impl fmt::Debug for PrincipalPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalPatch")
            .field("name", &self.name)
            .field("contact", &self.contact)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("active", &self.active)
            .finish()
    }
}

/// Storage-level row for a new principal (digest already computed)
#[derive(Clone, PartialEq, Eq)]
pub struct NewPrincipalRecord {
    pub name: String,
    pub contact: String,
    pub credential_digest: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub position: Option<String>,
    pub active: bool,
}

impl fmt::Debug for NewPrincipalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPrincipalRecord")
            .field("name", &self.name)
            .field("contact", &self.contact)
            .field("credential_digest", &"<redacted>")
            .finish()
    }
}

/// Storage-level changes; `None` leaves the column as it is
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PrincipalChanges {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub credential_digest: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub position: Option<String>,
    pub active: Option<bool>,
}

impl fmt::Debug for PrincipalChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalChanges")
            .field("name", &self.name)
            .field("contact", &self.contact)
            .field(
                "credential_digest",
                &self.credential_digest.as_ref().map(|_| "<redacted>"),
            )
            .field("active", &self.active)
            .finish()
    }
}
