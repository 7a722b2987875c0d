//! # Authentication Module
//!
//! Handles JWT token issuance, validation, and the middleware stages that
//! secure API endpoints.

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod rate_limit;

pub use jwt::JwtService;
pub use rate_limit::RateLimiter;
