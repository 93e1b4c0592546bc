//! Inmo - backend for a real-estate listing platform
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Google sign-in and session endpoints                     │
//! │  - Publication submission                                   │
//! │  - Admin review endpoints                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Listing validation and creation                          │
//! │  - Identity exchange                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for publications, admin and metrics
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `auth`: Google OAuth, session tokens and access guards
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like database pool and HTTP client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// HTTP client for the identity provider
    pub http_client: Arc<reqwest::Client>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Build HTTP client
    /// 3. Promote configured admin emails
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!(path = %config.database.path.display(), "Database connected");

        // 2. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Inmo/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        // 3. Initialize admin users
        Self::ensure_admin_users(&db, &config).await?;

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            http_client: Arc::new(http_client),
        })
    }

    /// Grant the admin role to every existing user listed in `auth.admin_emails`
    ///
    /// Users who have not signed in yet are promoted on a later start.
    async fn ensure_admin_users(
        db: &data::Database,
        config: &config::AppConfig,
    ) -> Result<(), error::AppError> {
        if config.auth.admin_emails.is_empty() {
            return Ok(());
        }

        let promoted = db.promote_users_by_email(&config.auth.admin_emails).await?;
        tracing::info!(
            configured = config.auth.admin_emails.len(),
            promoted,
            "Admin users ensured"
        );

        Ok(())
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.client);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .nest("/publications", api::publications_router(state.clone()))
        .nest("/admin", api::admin_router(state.clone()))
        .merge(api::metrics_router(state.clone()))
        .layer(middleware::from_fn(api::track_metrics))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Credentialed CORS for the single configured client origin
fn build_cors_layer(client: &config::ClientConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(&client.origin) {
        Ok(origin) => base.allow_origin([origin]),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %client.origin,
                "Failed to parse CORS origin from client.origin; denying cross-origin requests"
            );
            base
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
