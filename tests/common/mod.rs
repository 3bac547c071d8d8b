//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use storefront_auth::auth::{
    Argon2Hasher, HasherConfig, LoginCoordinator, RateLimitConfig, TokenService,
};
use storefront_auth::directory::SqliteDatabase;
use storefront_auth::server::{build_app, AppState};
use storefront_auth::telemetry::AuthMetrics;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Argon2 with minimal cost so tests stay fast
pub fn create_test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(HasherConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("Failed to create test hasher")
}

/// Create a test application state
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    create_test_state_with_limit(None).await
}

/// Create a test application state, optionally with login throttling
pub async fn create_test_state_with_limit(
    rate_limit: Option<RateLimitConfig>,
) -> AppState<SqliteDatabase> {
    let coordinator = LoginCoordinator::new(
        create_test_database().await,
        Arc::new(create_test_hasher()),
        Arc::new(TokenService::new(TEST_JWT_SECRET, 3600)),
        rate_limit,
    );
    AppState::new(coordinator, AuthMetrics::noop())
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState<SqliteDatabase>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = build_app(state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await
        .expect("Server error");
    });

    // Give the server a moment to start (100ms is sufficient for slow CI systems)
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}

/// Register a customer through the public endpoint
pub async fn register_customer(
    client: &reqwest::Client,
    addr: SocketAddr,
    name: &str,
    contact: &str,
    secret: &str,
) -> reqwest::Response {
    client
        .post(format!("http://{}/auth/register/customer", addr))
        .json(&serde_json::json!({"name": name, "contact": contact, "secret": secret}))
        .send()
        .await
        .expect("Failed to send register request")
}

/// Log in through `path` (`/auth/login`, `/auth/login/admin`, `/auth/login/staff`)
pub async fn login(
    client: &reqwest::Client,
    addr: SocketAddr,
    path: &str,
    contact: &str,
    secret: &str,
) -> reqwest::Response {
    client
        .post(format!("http://{}{}", addr, path))
        .json(&serde_json::json!({"contact": contact, "secret": secret}))
        .send()
        .await
        .expect("Failed to send login request")
}
