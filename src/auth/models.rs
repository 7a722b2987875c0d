//! Authentication Models
//!
//! Data structures for authentication requests, responses, and user information.

use serde::{Deserialize, Serialize};

use crate::auth::jwt::{AccessClaims, AccessGrant};
use crate::database::User;

/// Login request payload; fields are optional so absence is reported as a
/// validation error rather than a deserialization failure
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public view of a user returned by the session endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub email: String,
    pub role: String,
    pub user_id: Option<i64>,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            role: user.role.clone(),
            user_id: user.id,
            name: user.name.clone(),
        }
    }
}

impl From<&AccessClaims> for UserSummary {
    fn from(claims: &AccessClaims) -> Self {
        Self {
            email: claims.sub.clone(),
            role: claims.role.clone(),
            user_id: claims.user_id,
            name: claims.name.clone(),
        }
    }
}

impl UserSummary {
    /// Fresh row fields take precedence; token claims fill any gaps
    pub fn merged(claims: &AccessClaims, user: &User) -> Self {
        let pick = |fresh: &str, fallback: &str| {
            if fresh.is_empty() { fallback.to_string() } else { fresh.to_string() }
        };
        Self {
            email: claims.sub.clone(),
            role: pick(&user.role, &claims.role),
            user_id: user.id.or(claims.user_id),
            name: pick(&user.name, &claims.name),
        }
    }
}

impl From<&User> for AccessGrant {
    fn from(user: &User) -> Self {
        Self {
            role: user.role.clone(),
            user_id: user.id,
            name: user.name.clone(),
        }
    }
}

/// Body of a successful login or refresh; the refresh token travels only in
/// its cookie
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserSummary,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserSummary,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub msg: String,
    pub user: String,
    pub logged_out_at: String,
}
