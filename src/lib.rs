//! # habitctl: Habit Tracking API
//!
//! `habitctl` is a web API for tracking recurring habits. Users register an
//! account, log in for a JWT access/refresh token pair, and manage habit
//! records: where, when, and what to do, how long it takes, and how often it
//! repeats. Each habit is owned by exactly one user; publishing a habit makes
//! it readable (never writable) by everyone else through a shared catalogue.
//!
//! ## Overview
//!
//! A habit is stored in a single table but validated against one of two
//! shapes selected per request by the `is_pleasant_habit` body flag: one
//! shape allows a reward or a link to another habit (never both), the other
//! forbids rewards and links entirely. Cross-habit links may only target
//! habits stored with the pleasant flag that are visible to the requester.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL via SQLx for persistence.
//!
//! Requests pass through a Bearer-token extractor that validates the JWT
//! access token, then reach a handler which validates the payload and calls
//! into the database layer. The **API layer** ([`api`]) holds the handlers
//! and wire models, the **authentication layer** ([`auth`]) covers password
//! hashing, token minting/verification, and the request extractor, and the
//! **database layer** ([`db`]) uses the repository pattern: each entity has
//! a repository wrapping a connection and exposing typed CRUD operations.
//! Ownership checks live in the SQL itself, so a write against someone
//! else's habit affects zero rows and surfaces as 404.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use habitctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = habitctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     habitctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and runs migrations on
//! startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! habitctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{config::CorsOrigin, openapi::ApiDoc};
use axum::{
    http::{self, HeaderValue},
    routing::{delete, get, post, put},
    Router,
};
pub use config::Config;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{HabitId, UserId};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the habitctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Routes use a trailing-slash convention throughout.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let user_routes = Router::new()
        .route("/users/create/", post(api::handlers::users::create_user))
        .route("/users/token/", post(api::handlers::tokens::obtain_token_pair))
        .route("/users/token/refresh/", post(api::handlers::tokens::refresh_token))
        .route("/users/", get(api::handlers::users::list_users))
        .route("/users/{id}/", get(api::handlers::users::get_user))
        .route(
            "/users/update/{id}/",
            put(api::handlers::users::update_user).patch(api::handlers::users::update_user),
        )
        .route("/users/delete/{id}/", delete(api::handlers::users::delete_user));

    let habit_routes = Router::new()
        .route(
            "/habits/",
            post(api::handlers::habits::create_habit).get(api::handlers::habits::list_my_habits),
        )
        .route("/habits/public/", get(api::handlers::habits::list_public_habits))
        .route(
            "/habits/{id}/",
            get(api::handlers::habits::get_habit)
                .put(api::handlers::habits::update_habit)
                .patch(api::handlers::habits::update_habit)
                .delete(api::handlers::habits::delete_habit),
        );

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(user_routes)
        .merge(habit_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Connect to the database per the pool settings and run migrations.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;

    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));

    // Zero means "never" for both timeouts
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }

    let pool = options.connect(&config.database.url).await?;
    migrator().run(&pool).await?;

    Ok(pool)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application over an existing pool (used by tests); when no
    /// pool is given, connect and migrate per the configuration.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting habitctl with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => setup_database(&config).await?,
        };

        let state = AppState {
            db: pool.clone(),
            config: config.clone(),
        };
        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "habitctl listening on http://{}, docs at http://localhost:{}/docs",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
