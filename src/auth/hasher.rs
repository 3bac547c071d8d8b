//! Credential hashing
//!
//! Secrets are stored as Argon2id PHC strings (`$argon2id$v=19$...`) with a
//! random per-digest salt. A value that already carries the `$argon2`
//! signature is treated as a digest and is never hashed a second time.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Signature prefix shared by every Argon2 PHC string
pub const DIGEST_PREFIX: &str = "$argon2";

/// Hashing seam injected into directories and the login coordinator
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext secret with a fresh salt
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Check a plaintext secret against a stored digest
    ///
    /// Never fails: a mismatch or a malformed digest yields `false`.
    fn verify(&self, digest: &str, plaintext: &str) -> bool;

    /// Whether the value already carries the hasher's signature
    fn is_digest(&self, value: &str) -> bool {
        value.starts_with(DIGEST_PREFIX)
    }

    /// Hash the value unless it is already a digest
    fn ensure_digest(&self, value: &str) -> Result<String, HashError> {
        if self.is_digest(value) {
            Ok(value.to_string())
        } else {
            self.hash(value)
        }
    }
}

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasherConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_memory_kib() -> u32 {
    Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    Params::DEFAULT_P_COST
}

/// Argon2id implementation of [`CredentialHasher`]
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Create a hasher with explicit cost parameters
    pub fn new(config: HasherConfig) -> Result<Self, HashError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| HashError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::HashFailed(e.to_string()))
    }

    fn verify(&self, digest: &str, plaintext: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(h) => h,
            Err(_) => return false,
        };

        // Parameters are read from the digest itself, so digests produced
        // with other cost settings still verify.
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Error type for credential hashing operations
#[derive(Debug, Clone, PartialEq)]
pub enum HashError {
    /// Hashing failed
    HashFailed(String),

    /// Cost parameters were rejected
    InvalidParams(String),
}

impl std::fmt::Display for HashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashError::HashFailed(msg) => write!(f, "Hash failed: {}", msg),
            HashError::InvalidParams(msg) => write!(f, "Invalid hasher parameters: {}", msg),
        }
    }
}

impl std::error::Error for HashError {}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(HasherConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}
