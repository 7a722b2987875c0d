// # Routes Module
//
// - This module contains all HTTP route handlers.
// - Routes are organized by functionality into separate submodules and
//   registered in `server.rs`.

use crate::docs::DocumentedRoute;
use crate::error::ApiError;

/// Session lifecycle: login, verify, refresh, logout
pub mod auth;

/// Player trade processing
pub mod admin;

/// Served API documentation
pub mod docs;

/// Health check endpoint
pub mod health;

/// Game and player statistics
pub mod stats;

/// Every route that appears in the served API spec
pub const DOCUMENTED_ROUTES: &[DocumentedRoute] = &[
    DocumentedRoute { method: "POST", path: "/api/auth/login", operation: "login" },
    DocumentedRoute { method: "GET", path: "/api/auth/verify", operation: "verify_token" },
    DocumentedRoute { method: "POST", path: "/api/auth/refresh", operation: "refresh" },
    DocumentedRoute { method: "POST", path: "/api/auth/logout", operation: "logout" },
    DocumentedRoute { method: "POST", path: "/api/stats/by-game", operation: "get_game_stats" },
    DocumentedRoute { method: "POST", path: "/api/stats/by-date", operation: "get_date_stats" },
    DocumentedRoute { method: "POST", path: "/api/admin/trade-tool", operation: "trade_tool" },
];

/// JSON 404 for unknown paths
pub async fn not_found() -> ApiError {
    ApiError::not_found("The requested route does not exist")
}
