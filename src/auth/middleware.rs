//! Authentication Middleware
//!
//! Request pipeline stages built on `axum::middleware::from_fn*`. Routes apply
//! them in a fixed order: rate limit, JSON content type, access token, role.
//! Each stage is a plain async function and can be exercised on its own.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::jwt::{AccessClaims, JwtService, TokenError};
use crate::auth::rate_limit::RateLimiter;
use crate::error::ApiError;

/// Authentication middleware that validates access tokens and injects claims
pub struct AuthMiddleware;

impl AuthMiddleware {
    /// Require a valid access token in `Authorization: Bearer <token>`.
    ///
    /// The token is read from the header only; the refresh cookie is never
    /// consulted here. On success the [`AccessClaims`] are stored in the
    /// request extensions for downstream handlers.
    pub async fn require_access_token(
        State(jwt_service): State<Arc<JwtService>>,
        mut req: Request,
        next: Next,
    ) -> Result<Response, ApiError> {
        let token = bearer_token(req.headers()).ok_or(TokenError::Missing);
        let claims = token.and_then(|t| jwt_service.decode_access(t));

        let claims = match claims {
            Ok(claims) => claims,
            Err(reason) => {
                log_security_event(
                    "token_rejected",
                    req.headers(),
                    &client_ip(&req),
                    &reason.to_string(),
                );
                return Err(ApiError::AccessToken(reason));
            }
        };

        tracing::debug!(sub = %claims.sub, role = %claims.role, "access token accepted");
        req.extensions_mut().insert(claims);
        Ok(next.run(req).await)
    }

    /// Require the authenticated user to hold `role`; runs after
    /// [`AuthMiddleware::require_access_token`]
    pub async fn require_role(
        State(role): State<&'static str>,
        req: Request,
        next: Next,
    ) -> Result<Response, ApiError> {
        let Some(claims) = req.extensions().get::<AccessClaims>() else {
            return Err(ApiError::AccessToken(TokenError::Missing));
        };

        if claims.role != role {
            tracing::warn!(
                event = "role_denied",
                sub = %claims.sub,
                role = %claims.role,
                required = role,
                "access denied"
            );
            return Err(ApiError::Forbidden {
                required: role.to_string(),
            });
        }
        Ok(next.run(req).await)
    }
}

/// Reject body-carrying methods that are not sent as JSON
pub async fn require_json(req: Request, next: Next) -> Result<Response, ApiError> {
    if matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) && !is_json(req.headers())
    {
        return Err(ApiError::InvalidContentType);
    }
    Ok(next.run(req).await)
}

/// Count the request against the client's window
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&req);
    if !limiter.check(&ip) {
        log_security_event("rate_limited", req.headers(), &ip, req.uri().path());
        return Err(ApiError::RateLimited {
            max: limiter.max_requests(),
            window: limiter.window(),
        });
    }
    Ok(next.run(req).await)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json")
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
}

/// `X-Real-IP` when a proxy sets it, otherwise the peer address
pub fn client_ip(req: &Request) -> String {
    req.headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Structured log line for security-relevant events
pub fn log_security_event(event: &str, headers: &HeaderMap, ip: &str, detail: &str) {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("Unknown");
    tracing::warn!(event, ip, user_agent, detail, "security event");
}
