//! HTTP API for the classroom server.
//!
//! This module provides the REST API over the credential lifecycle, the
//! caller's account and role-gated class operations.
//!
//! # Modules
//!
//! - [`auth`]: Sign-up, sign-in, token refresh and sign-out
//! - [`account`]: The caller's own account
//! - [`classes`]: Classes, join codes and membership
//! - [`middleware`]: Authentication middleware for protected endpoints
//! - [`request_id`]: Request ids, request logging and request counters
//! - [`error`]: Mapping of service errors to HTTP responses
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pi_server::api::{AppState, create_router};
//! use private_instruction::{AccountManager, AuthConfig, AuthManager, ClassManager};
//! use private_instruction::db::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let config = AuthConfig::new("a".repeat(32), "pepper_pepper_pepper".to_string());
//!
//! let state = AppState {
//!     auth: Arc::new(AuthManager::new(store.clone(), store.clone(), &config)?),
//!     accounts: Arc::new(AccountManager::new(store.clone())),
//!     classes: Arc::new(ClassManager::new(store.clone(), store.clone(), chrono::Duration::hours(24))),
//!     health: store,
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod account;
pub mod auth;
pub mod classes;
pub mod error;
pub mod middleware;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
};
use private_instruction::{AccountManager, AuthManager, ClassManager, db::HealthCheck};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub accounts: Arc<AccountManager>,
    pub classes: Arc<ClassManager>,
    /// Backing store, pinged by `/health`
    pub health: Arc<dyn HealthCheck>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET    /health                              - Health check (public)
/// POST   /api/v1/auth/signup                  - Create account (public)
/// POST   /api/v1/auth/signin                  - Sign in (public)
/// POST   /api/v1/auth/refresh                 - Rotate refresh secret (expired bearer + secret)
/// POST   /api/v1/auth/signout                 - End a session (auth required)
/// GET    /api/v1/me                           - Read own account (auth required)
/// PUT    /api/v1/me                           - Update own account (auth required)
/// DELETE /api/v1/me                           - Delete own account (auth required)
/// PUT    /api/v1/me/password                  - Change password (auth required)
/// GET    /api/v1/classes                      - List own classes (auth required)
/// POST   /api/v1/classes                      - Create class (auth required)
/// GET    /api/v1/classes/{class_id}           - Read class (member)
/// PUT    /api/v1/classes/{class_id}           - Update class (admin)
/// DELETE /api/v1/classes/{class_id}           - Delete class (admin)
/// POST   /api/v1/classes/{class_id}/join-code - Issue join code (admin)
/// POST   /api/v1/classes/join                 - Redeem join code (auth required)
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router(state: AppState) -> Router<AppState> {
    // Refresh is public: its bearer token is expected to be expired
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/refresh", post(auth::refresh));

    let protected_routes = Router::new()
        .route("/auth/signout", post(auth::signout))
        .route(
            "/me",
            get(account::get_me)
                .put(account::update_me)
                .delete(account::delete_me),
        )
        .route("/me/password", put(account::update_password))
        .route(
            "/classes",
            get(classes::list_classes).post(classes::create_class),
        )
        .route("/classes/join", post(classes::join_class))
        .route(
            "/classes/{class_id}",
            get(classes::get_class)
                .put(classes::update_class)
                .delete(classes::delete_class),
        )
        .route(
            "/classes/{class_id}/join-code",
            post(classes::generate_join_code),
        )
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store answers, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","version":"0.1.0","database":true,"timestamp":"2026-01-01T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match state.health.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            false
        }
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
