//! # Server Module
//!
//! HTTP server setup and route configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{JwtService, RateLimiter};
use crate::config::Config;
use crate::database::{DatabaseConnection, PgStore, QueryCatalog, StatsStore, TradeStore, UserStore};
use crate::docs::ApiDocs;
use crate::routes;

/// Session behaviour switches taken from configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Mark the refresh cookie `Secure`
    pub cookie_secure: bool,
    /// Hash submitted passwords before the credential check
    pub hash_passwords: bool,
}

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub jwt_service: Arc<JwtService>,
    pub users: Arc<dyn UserStore>,
    pub stats: Arc<dyn StatsStore>,
    pub trades: Arc<dyn TradeStore>,
    pub docs: Arc<ApiDocs>,
    pub login_limiter: Arc<RateLimiter>,
    pub session: SessionSettings,
}

impl AppState {
    pub fn new(
        config: &Config,
        users: Arc<dyn UserStore>,
        stats: Arc<dyn StatsStore>,
        trades: Arc<dyn TradeStore>,
        docs: ApiDocs,
    ) -> Self {
        Self {
            jwt_service: Arc::new(JwtService::new(&config.jwt)),
            users,
            stats,
            trades,
            docs: Arc::new(docs),
            login_limiter: Arc::new(RateLimiter::new(config.login_rate_limit)),
            session: SessionSettings {
                cookie_secure: config.cookie.secure,
                hash_passwords: config.hash_passwords,
            },
        }
    }
}

/// Assemble the full router with CORS and request tracing
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/apispec.json", get(routes::docs::apispec))
        .nest("/api/auth", routes::auth::create_auth_routes(&state))
        .nest("/api/stats", routes::stats::create_stats_routes())
        .nest("/api/admin", routes::admin::create_admin_routes(&state))
        .fallback(routes::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Starts the HTTP server and runs until Ctrl+C.
pub async fn start(config: Config) -> Result<()> {
    let queries = Arc::new(QueryCatalog::new(&config.sql_dir));
    let loaded = queries
        .preload()
        .with_context(|| format!("Failed to load SQL queries from {}", config.sql_dir.display()))?;
    tracing::info!("📚 Loaded {} named queries from {}", loaded, queries.dir().display());
    if queries.is_empty() {
        tracing::warn!("No named queries found; every store call will fail");
    }

    let db = DatabaseConnection::new(config.database.clone())
        .await
        .context("Failed to connect to DB")?;
    let store = Arc::new(PgStore::new(db, queries.clone()));
    let pool = store.connection().stats();
    tracing::info!(size = pool.size, idle = pool.idle, "🗄️  Database pool ready");

    let docs = ApiDocs::load(&config.api_docs_path)?;
    if docs.is_empty() {
        tracing::warn!("📖 No API docs loaded, /apispec.json lists bare routes");
    } else {
        tracing::info!("📖 Loaded {} documented operations", docs.len());
    }

    let state = AppState::new(&config, store.clone(), store.clone(), store, docs);
    spawn_limiter_cleanup(state.login_limiter.clone());
    spawn_reload_on_hangup(queries, state.login_limiter.clone());

    let app = build_router(state, &config.cors_origins);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/PORT")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {} - port may already be in use", addr))?;

    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/health", addr);
    tracing::info!("📖 API spec available at http://{}/apispec.json", addr);
    tracing::info!("🔧 Environment: {}", config.environment.as_str());
    tracing::info!(
        "🔑 Access token ttl {}s, refresh token ttl {}s",
        config.jwt.access_ttl.num_seconds(),
        config.jwt.refresh_ttl.num_seconds()
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

fn spawn_limiter_cleanup(limiter: Arc<RateLimiter>) {
    let every = limiter.window().max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            limiter.purge_idle();
        }
    });
}

/// On SIGHUP, re-read the SQL directory and forget login attempt history
#[cfg(unix)]
fn spawn_reload_on_hangup(queries: Arc<QueryCatalog>, limiter: Arc<RateLimiter>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::warn!("SIGHUP reload unavailable: {}", e);
            return;
        }
    };
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            queries.reset();
            limiter.reset();
            match queries.preload() {
                Ok(loaded) => tracing::info!("🔄 Reloaded {} named queries", loaded),
                Err(e) => tracing::error!("Failed to reload SQL queries: {}", e),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_queries: Arc<QueryCatalog>, _limiter: Arc<RateLimiter>) {}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}
