//! HTTP server components for storefront-auth
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - Route guards and request logging middleware
//! - Assembly of the application state from configuration
//! - Server lifecycle management

pub mod middleware;
pub mod router;

pub use middleware::{guard_middleware, ApiError, ErrorBody, RouteGuard};
pub use router::{build_router, AppState, HealthResponse, RouteGroup};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::auth::{Argon2Hasher, LoginCoordinator, TokenService};
use crate::config::{Config, ConfigError, ServerConfig};
use crate::directory::{Database, SqliteDatabase};
use crate::error::{AppError, DirectoryError};
use crate::telemetry::AuthMetrics;

/// HTTP Server for storefront-auth
pub struct Server<D: Database + 'static> {
    config: ServerConfig,
    state: AppState<D>,
}

impl<D: Database + 'static> Server<D> {
    pub fn new(config: ServerConfig, state: AppState<D>) -> Self {
        Self { config, state }
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        )
    }

    /// Run the server until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let app = build_app(self.state);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        tracing::info!("Server listening on {}", addr);

        // Peer addresses feed the failed-login throttle
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Router with the request-wide middleware stack applied
pub fn build_app<D: Database + 'static>(state: AppState<D>) -> Router {
    build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(axum::middleware::from_fn(middleware::tracing_middleware))
            .layer(axum::middleware::from_fn(middleware::logging_middleware)),
    )
}

/// Open storage, wire the auth components and seed the bootstrap admin
pub async fn build_state(
    config: &Config,
    metrics: AuthMetrics,
) -> Result<AppState<SqliteDatabase>, AppError> {
    config.validate()?;

    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| ConfigError::MissingRequired("auth.jwt_secret".to_string()))?;

    let database = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    tracing::info!(path = %config.database.path, "Database initialized");

    let hasher = Argon2Hasher::new(config.auth.hasher).map_err(DirectoryError::from)?;
    let tokens = Arc::new(TokenService::new(secret, config.auth.token_ttl_secs));

    let coordinator = LoginCoordinator::new(
        database,
        Arc::new(hasher),
        tokens,
        config.auth.rate_limit.limiter_config(),
    );

    if let Some(admin) = &config.auth.bootstrap_admin {
        let created = coordinator
            .ensure_bootstrap_admin(admin.to_new_principal())
            .await?;
        tracing::info!(created, "Bootstrap administrator checked");
    }

    tracing::info!(
        token_ttl_secs = config.auth.token_ttl_secs,
        throttling = config.auth.rate_limit.enabled,
        "Authentication initialized"
    );

    Ok(AppState::new(coordinator, metrics))
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hasher::test_hasher;
    use crate::config::BootstrapAdminConfig;
    use crate::directory::MockDatabase;
    use crate::models::Role;
    use std::time::Duration;

    fn create_mock_state() -> AppState<MockDatabase> {
        let coordinator = LoginCoordinator::new(
            Arc::new(MockDatabase::new()),
            Arc::new(test_hasher()),
            Arc::new(TokenService::new("server-test-secret", 3600)),
            None,
        );
        AppState::new(coordinator, AuthMetrics::noop())
    }

    fn in_memory_config() -> Config {
        let mut config = Config::default();
        config.database.path = ":memory:".to_string();
        config.auth.jwt_secret = Some("server-test-secret".to_string());
        config.auth.hasher = crate::auth::HasherConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        config
    }

    // Test 1: Server can be created with config
    #[test]
    fn test_server_new() {
        let server = Server::new(ServerConfig::default(), create_mock_state());
        assert_eq!(server.bind_addr().port(), 8080);
    }

    // Test 2: Server bind address calculation
    #[test]
    fn test_server_bind_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9090,
        };
        let server = Server::new(config, create_mock_state());
        assert_eq!(server.bind_addr().to_string(), "127.0.0.1:9090");
    }

    // Test 3: Server graceful shutdown
    #[tokio::test]
    async fn test_server_graceful_shutdown() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let server = Server::new(config, create_mock_state());

        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        };

        let handle = tokio::spawn(async move { server.run(shutdown).await });
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    // Test 4: ServerError display messages
    #[test]
    fn test_server_error_display() {
        let bind_err = ServerError::Bind("address in use".to_string());
        assert_eq!(
            bind_err.to_string(),
            "Failed to bind to address: address in use"
        );

        let serve_err = ServerError::Serve("connection reset".to_string());
        assert_eq!(serve_err.to_string(), "Server error: connection reset");
    }

    // Test 5: Missing signing secret stops startup
    #[tokio::test]
    async fn test_build_state_requires_secret() {
        let mut config = in_memory_config();
        config.auth.jwt_secret = None;

        match build_state(&config, AuthMetrics::noop()).await {
            Err(AppError::Config(ConfigError::MissingRequired(key))) => {
                assert_eq!(key, "auth.jwt_secret")
            }
            Err(other) => panic!("Expected MissingRequired, got {:?}", other),
            Ok(_) => panic!("Expected MissingRequired"),
        }
    }

    // Test 6: Bootstrap admin is seeded once and can log in
    #[tokio::test]
    async fn test_build_state_seeds_admin() {
        let mut config = in_memory_config();
        config.auth.bootstrap_admin = Some(BootstrapAdminConfig {
            name: "Root".to_string(),
            contact: "root@x.com".to_string(),
            secret: "rootpw".to_string(),
        });

        let state = build_state(&config, AuthMetrics::noop()).await.unwrap();
        let admins = state.coordinator.list_principals(Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].contact, "root@x.com");

        let seeded_again = state
            .coordinator
            .ensure_bootstrap_admin(config.auth.bootstrap_admin.unwrap().to_new_principal())
            .await
            .unwrap();
        assert!(!seeded_again);
    }

    // Test 7: Throttling follows the config switch
    #[tokio::test]
    async fn test_build_state_throttling_opt_in() {
        let config = in_memory_config();
        let state = build_state(&config, AuthMetrics::noop()).await.unwrap();
        assert!(state.coordinator.rate_limiter().is_none());

        let mut config = in_memory_config();
        config.auth.rate_limit.enabled = true;
        let state = build_state(&config, AuthMetrics::noop()).await.unwrap();
        assert!(state.coordinator.rate_limiter().is_some());
    }
}
