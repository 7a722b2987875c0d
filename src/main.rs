//! # Ruleya Server
//!
//! HTTP API for the sports-statistics and fantasy platform, built with Axum
//! and Tokio on top of PostgreSQL.
//!
//! ## Features
//! - Access/refresh token sessions with an HTTP-only refresh cookie
//! - Game and daily scoreboard statistics
//! - Admin trade tool for roster moves
//! - Named SQL queries loaded from `sql/*.sql`
//! - Swagger document served at `/apispec.json`
//!
//! ## Architecture
//! - `server`: router assembly and startup
//! - `config`: environment configuration
//! - `auth`: tokens, middleware, login rate limiting
//! - `database`: pool, query catalog, stores
//! - `routes`: HTTP handlers by area
//!
//! ## Environment Setup
//! ```bash
//! cp .env.example .env
//! cargo run
//! curl http://localhost:5000/health
//! ```

mod auth;
mod config;
mod database;
mod docs;
mod error;
mod routes;
mod server;
#[cfg(test)]
mod test_support;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    tracing::info!("🏁 Starting Ruleya Server...");
    tracing::info!("📦 Package: {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    tracing::info!("🏗️  Build profile: {}", if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    });

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::start(config).await {
        tracing::error!("❌ Server failed: {:#}", e);
        std::process::exit(1);
    }
}
