//! Configuration management for storefront-auth
//!
//! Configuration is read from a YAML file (with `${VAR}` expansion) and can
//! be overridden by environment variables prefixed with `STOREFRONT_AUTH_`.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{HasherConfig, RateLimitConfig, MAX_TOKEN_TTL_SECS};
use crate::models::NewPrincipal;

const ENV_PREFIX: &str = "STOREFRONT_AUTH_";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Credentials, tokens and login throttling
    #[serde(default)]
    pub auth: AuthConfig,

    /// Principal storage
    #[serde(default)]
    pub database: DatabaseConfig,

    /// OpenTelemetry export
    #[serde(default)]
    pub otel: OtelConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml)?;
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Build configuration from defaults and `STOREFRONT_AUTH_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::default().with_env_overrides()
    }

    /// Apply `STOREFRONT_AUTH_*` variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(host) = env_var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("SERVER_PORT") {
            self.server.port = parse_env("SERVER_PORT", &port)?;
        }

        if let Some(path) = env_var("DATABASE_PATH") {
            self.database.path = path;
        }

        if let Some(secret) = env_var("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(ttl) = env_var("TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = parse_env("TOKEN_TTL_SECS", &ttl)?;
        }

        if let Some(enabled) = env_var("RATE_LIMIT_ENABLED") {
            self.auth.rate_limit.enabled = parse_env("RATE_LIMIT_ENABLED", &enabled)?;
        }

        let admin_name = env_var("BOOTSTRAP_ADMIN_NAME");
        let admin_contact = env_var("BOOTSTRAP_ADMIN_CONTACT");
        let admin_secret = env_var("BOOTSTRAP_ADMIN_SECRET");
        if let (Some(contact), Some(secret)) = (admin_contact, admin_secret) {
            self.auth.bootstrap_admin = Some(BootstrapAdminConfig {
                name: admin_name.unwrap_or_else(default_admin_name),
                contact,
                secret,
            });
        }

        if let Some(enabled) = env_var("OTEL_ENABLED") {
            self.otel.enabled = parse_env("OTEL_ENABLED", &enabled)?;
        }
        if let Some(endpoint) = env_var("OTEL_ENDPOINT") {
            self.otel.endpoint = Some(endpoint);
        }

        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string())),
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.token_ttl_secs must be greater than zero".to_string(),
            ));
        }

        if self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token_ttl_secs must not exceed {}",
                MAX_TOKEN_TTL_SECS
            )));
        }

        if self.auth.rate_limit.enabled && self.auth.rate_limit.max_failures == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.max_failures must be greater than zero".to_string(),
            ));
        }

        if let Some(admin) = &self.auth.bootstrap_admin {
            if admin.contact.trim().is_empty() || admin.secret.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "auth.bootstrap_admin requires a contact and a secret".to_string(),
                ));
            }
        }

        if self.otel.enabled && self.otel.endpoint.is_none() {
            return Err(ConfigError::MissingRequired("otel.endpoint".to_string()));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "logging.level: unknown level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}

fn parse_env<T: std::str::FromStr>(suffix: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("Invalid value for {}{}", ENV_PREFIX, suffix)))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens (required)
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Argon2 cost parameters
    #[serde(default)]
    pub hasher: HasherConfig,

    /// Failed-login throttling
    #[serde(default)]
    pub rate_limit: AuthRateLimitConfig,

    /// Administrator seeded at startup when absent
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: default_token_ttl(),
            hasher: HasherConfig::default(),
            rate_limit: AuthRateLimitConfig::default(),
            bootstrap_admin: None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("hasher", &self.hasher)
            .field("rate_limit", &self.rate_limit)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

fn default_token_ttl() -> u64 {
    crate::auth::DEFAULT_TOKEN_TTL_SECS
}

/// Rate limiting configuration for failed logins
///
/// Off by default; every failed login is answered with 401 until enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthRateLimitConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Failures within the window before an IP is blocked
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Block duration in seconds
    #[serde(default = "default_block_duration")]
    pub block_duration_secs: u64,

    /// Sliding window in seconds
    #[serde(default = "default_window_duration")]
    pub window_duration_secs: u64,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_failures: default_max_failures(),
            block_duration_secs: default_block_duration(),
            window_duration_secs: default_window_duration(),
        }
    }
}

impl From<&AuthRateLimitConfig> for RateLimitConfig {
    fn from(config: &AuthRateLimitConfig) -> Self {
        RateLimitConfig {
            max_failures: config.max_failures,
            block_duration: Duration::from_secs(config.block_duration_secs),
            window_duration: Duration::from_secs(config.window_duration_secs),
        }
    }
}

impl AuthRateLimitConfig {
    /// Limiter settings, or `None` when throttling is disabled
    pub fn limiter_config(&self) -> Option<RateLimitConfig> {
        self.enabled.then(|| RateLimitConfig::from(self))
    }
}

fn default_max_failures() -> u32 {
    10
}

fn default_block_duration() -> u64 {
    300
}

fn default_window_duration() -> u64 {
    600
}

/// Administrator seeded at startup
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct BootstrapAdminConfig {
    #[serde(default = "default_admin_name")]
    pub name: String,

    #[serde(alias = "email")]
    pub contact: String,

    /// Plaintext secret or an existing Argon2 digest
    #[serde(alias = "password")]
    pub secret: String,
}

impl BootstrapAdminConfig {
    pub fn to_new_principal(&self) -> NewPrincipal {
        NewPrincipal::new(&self.name, &self.contact, &self.secret)
    }
}

impl fmt::Debug for BootstrapAdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdminConfig")
            .field("name", &self.name)
            .field("contact", &self.contact)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (`:memory:` for an ephemeral store)
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/storefront-auth.db".to_string()
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OTLP export is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name attached to exported spans and metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "storefront-auth".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand `${VAR_NAME}` references; unknown variables are left as written
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    Ok(re
        .replace_all(input, |caps: &regex_lite::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned())
}
