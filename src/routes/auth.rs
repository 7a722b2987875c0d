//! Session routes: login, verify, refresh and logout.
//!
//! A session is an access token held by the client plus a refresh token held
//! in an HTTP-only cookie. Login creates both; refresh mints a new access
//! token from the cookie and leaves the cookie untouched; logout clears the
//! cookie. Issued access tokens cannot be revoked and simply run out.

use anyhow::Context;
use axum::extract::{FromRequest, Request, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{SecondsFormat, Utc};
use time::OffsetDateTime;

use crate::auth::jwt::{AccessClaims, AccessGrant, TokenError};
use crate::auth::middleware::{AuthMiddleware, client_ip, log_security_event, rate_limit, require_json};
use crate::auth::models::{LoginRequest, LogoutResponse, TokenResponse, UserSummary, VerifyResponse};
use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::server::AppState;

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Minimal syntactic email check
fn is_valid_email(email: &str) -> bool {
    email.contains('@') && email.contains('.')
}

fn refresh_cookie(token: String, max_age: chrono::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

fn cleared_refresh_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// POST /login
///
/// Checks the credentials, returns an access token in the body and sets the
/// refresh token cookie. The submitted password is compared as a hash; it is
/// only hashed here when `HASH_PASSWORDS` is enabled.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let ip = client_ip(&req);
    let headers = req.headers().clone();

    let Json(payload) = Json::<LoginRequest>::from_request(req, &state)
        .await
        .map_err(|rejection| {
            tracing::warn!(reason = %rejection.body_text(), "login attempt without a JSON body");
            ApiError::validation("No data sent")
        })?;

    let email = payload.email.as_deref().map(str::trim).unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        tracing::warn!("login attempt without email or password");
        return Err(ApiError::validation("Email and password are required"));
    }
    if !is_valid_email(email) {
        tracing::warn!(email, "login attempt with malformed email");
        return Err(ApiError::validation("Invalid email format"));
    }

    let credential = if state.session.hash_passwords {
        hash_password(&password)
    } else {
        password
    };

    let Some(user) = state.users.authenticate(email, &credential).await? else {
        log_security_event("login_failed", &headers, &ip, email);
        return Err(ApiError::InvalidCredentials);
    };

    let token = state
        .jwt_service
        .issue_access(email, &AccessGrant::from(&user))
        .context("Failed to encode access token")?;
    let refresh_token = state
        .jwt_service
        .issue_refresh(email)
        .context("Failed to encode refresh token")?;

    tracing::info!(
        event = "login_succeeded",
        email,
        ip = %ip,
        access_ttl_secs = state.jwt_service.access_ttl().num_seconds(),
        "tokens issued"
    );

    let cookie = refresh_cookie(
        refresh_token,
        state.jwt_service.refresh_ttl(),
        state.session.cookie_secure,
    );
    let user = UserSummary {
        email: email.to_string(),
        ..UserSummary::from(&user)
    };

    Ok((
        jar.add(cookie),
        Json(TokenResponse {
            token,
            user,
            message: "Login successful".to_string(),
        }),
    ))
}

/// GET /verify
///
/// Confirms the access token and returns the user with role and name taken
/// from the database when it can be reached, else from the token.
pub async fn verify(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let user = match state.users.find_by_email(&claims.sub).await {
        Ok(Some(user)) => UserSummary::merged(&claims, &user),
        Ok(None) => {
            tracing::warn!(email = %claims.sub, "user vanished before verify");
            return Err(ApiError::not_found("User not found"));
        }
        Err(e) => {
            tracing::error!(error = %e, email = %claims.sub, "user lookup failed, using token claims");
            UserSummary::from(&claims)
        }
    };

    Ok(Json(VerifyResponse {
        valid: true,
        user,
        message: "Token is valid".to_string(),
    }))
}

/// POST /refresh
///
/// Reads the refresh token from its cookie only and returns a new access
/// token. The refresh token itself is not rotated.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::RefreshToken(TokenError::Missing))?;

    let claims = state.jwt_service.decode_refresh(&token).map_err(|reason| {
        tracing::warn!(%reason, "refresh token rejected");
        ApiError::RefreshToken(reason)
    })?;

    let Some(user) = state.users.find_by_email(&claims.sub).await? else {
        tracing::warn!(email = %claims.sub, "user vanished before refresh");
        return Err(ApiError::not_found("User not found"));
    };

    let token = state
        .jwt_service
        .issue_access(&claims.sub, &AccessGrant::from(&user))
        .context("Failed to encode access token")?;
    tracing::info!(email = %claims.sub, "access token refreshed");

    Ok(Json(TokenResponse {
        token,
        user: UserSummary {
            email: claims.sub,
            ..UserSummary::from(&user)
        },
        message: "Access token refreshed".to_string(),
    }))
}

/// POST /logout
///
/// Clears the refresh cookie. The presented access token stays valid until
/// it expires; there is no revocation list.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    tracing::info!(email = %claims.sub, "logout");
    (
        jar.add(cleared_refresh_cookie(state.session.cookie_secure)),
        Json(LogoutResponse {
            msg: "Logout successful".to_string(),
            user: claims.sub,
            logged_out_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    )
}

pub fn create_auth_routes(state: &AppState) -> Router<AppState> {
    let login_routes = Router::new()
        .route("/login", post(login))
        .layer(middleware::from_fn(require_json))
        .layer(middleware::from_fn_with_state(state.login_limiter.clone(), rate_limit));

    let session_routes = Router::new()
        .route("/verify", get(verify))
        .route("/logout", post(logout))
        .layer(middleware::from_fn_with_state(
            state.jwt_service.clone(),
            AuthMiddleware::require_access_token,
        ));

    Router::new()
        .route("/refresh", post(refresh))
        .merge(login_routes)
        .merge(session_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use chrono::Duration;
    use serde_json::json;

    use crate::auth::jwt::{JwtService, TokenClaims};
    use crate::config::{JwtConfig, RateLimitConfig};
    use crate::test_support::*;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::default().with_user(1, "a@b.com", "Ana", "admin", "h1"))
    }

    fn login_body(email: &str, password: &str) -> serde_json::Value {
        json!({ "email": email, "password": password })
    }

    fn verify_req(token: &str) -> axum::http::Request<axum::body::Body> {
        with_bearer(
            axum::http::Request::get("/api/auth/verify")
                .body(axum::body::Body::empty())
                .unwrap(),
            token,
        )
    }

    fn refresh_req(cookie: Option<&str>) -> axum::http::Request<axum::body::Body> {
        let req = axum::http::Request::post("/api/auth/refresh")
            .body(axum::body::Body::empty())
            .unwrap();
        match cookie {
            Some(cookie) => with_cookie(req, cookie),
            None => req,
        }
    }

    #[tokio::test]
    async fn login_issues_access_token_and_refresh_cookie() {
        let (app, state) = test_app(store());

        let (status, cookies, body) =
            send(&app, post_json("/api/auth/login", login_body("a@b.com", "h1"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");
        assert_eq!(body["user"]["email"], "a@b.com");
        assert_eq!(body["user"]["user_id"], 1);
        assert_eq!(body["user"]["name"], "Ana");
        assert!(body.get("refresh_token").is_none());

        let claims = state
            .jwt_service
            .decode_access(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.sub, "a@b.com");
        assert_eq!(claims.role, "admin");

        assert_eq!(cookies.len(), 1);
        let cookie = &cookies[0];
        assert!(cookie.starts_with("refresh_token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));
        assert!(!cookie.contains(body["token"].as_str().unwrap()));

        let refresh = cookie_pair(&cookies, REFRESH_COOKIE).unwrap();
        let refresh = refresh.trim_start_matches("refresh_token=");
        assert!(matches!(
            state.jwt_service.decode(refresh),
            Ok(TokenClaims::Refresh(_))
        ));
    }

    #[tokio::test]
    async fn secure_flag_follows_configuration() {
        let mut config = test_config();
        config.cookie.secure = true;
        let (app, _) = test_app_with(store(), config);

        let (_, cookies, _) =
            send(&app, post_json("/api/auth/login", login_body("a@b.com", "h1"))).await;
        assert!(cookies[0].contains("Secure"));
    }

    #[tokio::test]
    async fn bad_credentials_do_not_reveal_registration() {
        let (app, _) = test_app(store());

        let (wrong_pw, cookies, body_known) =
            send(&app, post_json("/api/auth/login", login_body("a@b.com", "nope"))).await;
        let (unknown, _, body_unknown) =
            send(&app, post_json("/api/auth/login", login_body("who@b.com", "h1"))).await;

        assert_eq!(wrong_pw, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown, StatusCode::UNAUTHORIZED);
        assert_eq!(body_known, body_unknown);
        assert_eq!(body_known["error"], "invalid_credentials");
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn login_validates_input_before_touching_store() {
        let store = store();
        store.set_failing(true);
        let mut config = test_config();
        config.login_rate_limit = RateLimitConfig {
            max_requests: 100,
            window: std::time::Duration::from_secs(300),
        };
        let (app, _) = test_app_with(store, config);

        for body in [
            json!({}),
            json!({ "email": "a@b.com" }),
            json!({ "password": "h1" }),
            json!({ "email": "", "password": "h1" }),
            login_body("not-an-email", "h1"),
        ] {
            let (status, _, body) = send(&app, post_json("/api/auth/login", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "validation_error");
        }

        let empty = axum::http::Request::post("/api/auth/login")
            .header("content-type", "application/json")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, empty).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let form = axum::http::Request::post("/api/auth/login")
            .header("content-type", "text/plain")
            .body(axum::body::Body::from("email=a@b.com"))
            .unwrap();
        let (status, _, body) = send(&app, form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_content_type");
    }

    #[tokio::test]
    async fn store_failure_during_login_is_internal_error() {
        let store = store();
        store.set_failing(true);
        let (app, _) = test_app(store);

        let (status, _, body) =
            send(&app, post_json("/api/auth/login", login_body("a@b.com", "h1"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["msg"], "Internal server error");
    }

    #[tokio::test]
    async fn server_side_hashing_when_enabled() {
        let store = Arc::new(MemoryStore::default().with_user(
            2,
            "h@b.com",
            "Hash",
            "user",
            &hash_password("plain"),
        ));
        let mut config = test_config();
        config.hash_passwords = true;
        let (app, _) = test_app_with(store, config);

        let (status, _, _) =
            send(&app, post_json("/api/auth/login", login_body("h@b.com", "plain"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn login_is_rate_limited_per_client() {
        let mut config = test_config();
        config.login_rate_limit = RateLimitConfig {
            max_requests: 2,
            window: std::time::Duration::from_secs(300),
        };
        let (app, state) = test_app_with(store(), config);

        for _ in 0..2 {
            let (status, _, _) =
                send(&app, post_json("/api/auth/login", login_body("a@b.com", "bad"))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, _, body) =
            send(&app, post_json("/api/auth/login", login_body("a@b.com", "h1"))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "too_many_requests");

        state.login_limiter.reset();
        let (status, _, _) =
            send(&app, post_json("/api/auth/login", login_body("a@b.com", "h1"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn verify_merges_fresh_fields_and_is_idempotent() {
        let store = store();
        let (app, state) = test_app(store.clone());
        let token = state
            .jwt_service
            .issue_access("a@b.com", &AccessGrant {
                role: "user".to_string(),
                user_id: Some(1),
                name: "Stale".to_string(),
            })
            .unwrap();

        let (status, _, first) = send(&app, verify_req(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["valid"], true);
        assert_eq!(first["user"]["role"], "admin");
        assert_eq!(first["user"]["name"], "Ana");

        let (_, _, second) = send(&app, verify_req(&token)).await;
        assert_eq!(first["user"], second["user"]);

        store.rename_user("a@b.com", "Ana Maria", "user");
        let (_, _, third) = send(&app, verify_req(&token)).await;
        assert_eq!(third["user"]["name"], "Ana Maria");
        assert_eq!(third["user"]["role"], "user");
    }

    #[tokio::test]
    async fn verify_falls_back_to_claims_when_store_is_down() {
        let store = store();
        let (app, state) = test_app(store.clone());
        let token = state
            .jwt_service
            .issue_access("a@b.com", &AccessGrant {
                role: "scout".to_string(),
                user_id: Some(1),
                name: "From Token".to_string(),
            })
            .unwrap();

        store.set_failing(true);
        let (status, _, body) = send(&app, verify_req(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "scout");
        assert_eq!(body["user"]["name"], "From Token");
    }

    #[tokio::test]
    async fn verify_rejects_deleted_user_and_bad_tokens() {
        let store = store();
        let (app, state) = test_app(store.clone());
        let grant = AccessGrant {
            role: "admin".to_string(),
            user_id: Some(1),
            name: "Ana".to_string(),
        };
        let token = state.jwt_service.issue_access("a@b.com", &grant).unwrap();

        let missing = axum::http::Request::get("/api/auth/verify")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, missing).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "authorization_required");

        let refresh = state.jwt_service.issue_refresh("a@b.com").unwrap();
        let (status, _, body) = send(&app, verify_req(&refresh)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_token");

        // The refresh cookie never stands in for the bearer header
        let cookie_only = with_cookie(
            axum::http::Request::get("/api/auth/verify")
                .body(axum::body::Body::empty())
                .unwrap(),
            &format!("refresh_token={}", refresh),
        );
        let (status, _, _) = send(&app, cookie_only).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        store.remove_user("a@b.com");
        let (status, _, body) = send(&app, verify_req(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn refresh_reports_missing_and_tampered_cookies() {
        let (app, state) = test_app(store());

        let (status, _, body) = send(&app, refresh_req(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing_refresh_token");

        let refresh = state.jwt_service.issue_refresh("a@b.com").unwrap();
        let tampered = format!("refresh_token={}x", refresh);
        let (status, _, body) = send(&app, refresh_req(Some(&tampered))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_refresh_token");

        // An access token in the cookie is the wrong kind
        let access = state
            .jwt_service
            .issue_access("a@b.com", &AccessGrant {
                role: "admin".to_string(),
                user_id: Some(1),
                name: "Ana".to_string(),
            })
            .unwrap();
        let (status, _, body) =
            send(&app, refresh_req(Some(&format!("refresh_token={}", access)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_refresh_token");

        let foreign = JwtService::new(&JwtConfig {
            secret: "someone-else".to_string(),
            access_ttl: Duration::seconds(20),
            refresh_ttl: Duration::days(7),
        })
        .issue_refresh("a@b.com")
        .unwrap();
        let (status, _, body) =
            send(&app, refresh_req(Some(&format!("refresh_token={}", foreign)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_refresh_token");
    }

    #[tokio::test]
    async fn refresh_mints_access_token_without_rotating_cookie() {
        let store = store();
        let (app, state) = test_app(store.clone());
        let refresh = state.jwt_service.issue_refresh("a@b.com").unwrap();
        let cookie = format!("refresh_token={}", refresh);

        let (status, set_cookies, body) = send(&app, refresh_req(Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(set_cookies.is_empty());
        assert_eq!(body["user"]["role"], "admin");

        let claims = state
            .jwt_service
            .decode_access(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.sub, "a@b.com");
        assert_eq!(claims.user_id, Some(1));

        store.remove_user("a@b.com");
        let (status, _, _) = send(&app, refresh_req(Some(&cookie))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn expired_refresh_cookie_is_invalid() {
        let (app, state) = test_app(store());
        let stale = state
            .jwt_service
            .issue_refresh_token_at("a@b.com", Duration::days(7), Utc::now() - Duration::days(8))
            .unwrap();

        let (status, _, body) =
            send(&app, refresh_req(Some(&format!("refresh_token={}", stale)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_refresh_token");
    }

    #[tokio::test]
    async fn logout_clears_cookie_even_when_refresh_expired() {
        let (app, state) = test_app(store());
        let grant = AccessGrant {
            role: "admin".to_string(),
            user_id: Some(1),
            name: "Ana".to_string(),
        };
        let access = state.jwt_service.issue_access("a@b.com", &grant).unwrap();
        let stale = state
            .jwt_service
            .issue_refresh_token_at("a@b.com", Duration::days(7), Utc::now() - Duration::days(8))
            .unwrap();

        for cookie in [None, Some(format!("refresh_token={}", stale))] {
            let mut req = with_bearer(
                axum::http::Request::post("/api/auth/logout")
                    .body(axum::body::Body::empty())
                    .unwrap(),
                &access,
            );
            if let Some(cookie) = &cookie {
                req = with_cookie(req, cookie);
            }

            let (status, set_cookies, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["user"], "a@b.com");
            assert!(body["logged_out_at"].is_string());

            let cleared = set_cookies
                .iter()
                .find(|c| c.starts_with("refresh_token="))
                .expect("refresh cookie cleared");
            assert_eq!(cookie_pair(&set_cookies, REFRESH_COOKIE).unwrap(), "refresh_token=");
            assert!(cleared.contains("Max-Age=0"));
            assert!(cleared.contains("Path=/"));
        }

        // Without an access token logout is refused
        let anonymous = axum::http::Request::post("/api/auth/logout")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, cookies, _) = send(&app, anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn session_lifecycle_survives_access_expiry() {
        let (app, state) = test_app(store());

        let (status, cookies, body) =
            send(&app, post_json("/api/auth/login", login_body("a@b.com", "h1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");
        let cookie = cookie_pair(&cookies, REFRESH_COOKIE).unwrap();

        // Stand-in for waiting out the 20 second access lifetime
        let expired = state
            .jwt_service
            .issue_access_token_at(
                "a@b.com",
                &AccessGrant {
                    role: "admin".to_string(),
                    user_id: Some(1),
                    name: "Ana".to_string(),
                },
                state.jwt_service.access_ttl(),
                Utc::now() - Duration::seconds(21),
            )
            .unwrap();
        let (status, _, body) = send(&app, verify_req(&expired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "token_expired");

        let (status, _, body) = send(&app, refresh_req(Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        let fresh = body["token"].as_str().unwrap().to_string();

        let (status, _, body) = send(&app, verify_req(&fresh)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "a@b.com");
    }
}
