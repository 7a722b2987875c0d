//! JWT Token Service
//!
//! Issues and validates the two bearer token kinds used by the session flow.
//! Access tokens are short-lived and carry the user's role and display name;
//! refresh tokens carry only the subject and exist solely to mint new access
//! tokens. Every token records its kind in the `type` claim and decoding
//! returns a discriminated [`TokenClaims`], so one kind is never accepted
//! where the other is required.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Why a presented token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token not provided")]
    Missing,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or its signature is invalid")]
    Invalid,
    #[error("token is not of the expected kind")]
    WrongKind,
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub role: String,
    pub user_id: Option<i64>,
    pub name: String,
    /// RFC 3339 time the claims were last sourced from the user row
    pub issued_at: String,
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// A decoded token of either kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenClaims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl TokenClaims {
    pub fn subject(&self) -> &str {
        match self {
            Self::Access(c) => &c.sub,
            Self::Refresh(c) => &c.sub,
        }
    }
}

/// User attributes embedded into an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub role: String,
    pub user_id: Option<i64>,
    pub name: String,
}

/// JWT Service for token operations
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    /// Create a new JWT service from the signing configuration
    pub fn new(config: &JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        // Access tokens live for seconds; the default 60s leeway would triple that
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        Self {
            encoding_key,
            decoding_key,
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Generate an access token with the configured lifetime
    pub fn issue_access(&self, subject: &str, grant: &AccessGrant) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_access_token(subject, grant, self.access_ttl)
    }

    /// Generate a refresh token with the configured lifetime
    pub fn issue_refresh(&self, subject: &str) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_refresh_token(subject, self.refresh_ttl)
    }

    pub fn issue_access_token(
        &self,
        subject: &str,
        grant: &AccessGrant,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_access_token_at(subject, grant, ttl, Utc::now())
    }

    pub fn issue_refresh_token(&self, subject: &str, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_refresh_token_at(subject, ttl, Utc::now())
    }

    /// Access token as issued at `now`
    pub fn issue_access_token_at(
        &self,
        subject: &str,
        grant: &AccessGrant,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = TokenClaims::Access(AccessClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            role: grant.role.clone(),
            user_id: grant.user_id,
            name: grant.name.clone(),
            issued_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        self.sign(&claims)
    }

    /// Refresh token as issued at `now`
    pub fn issue_refresh_token_at(
        &self,
        subject: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = TokenClaims::Refresh(RefreshClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        });
        self.sign(&claims)
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }

    /// Verify signature and expiry and return the claims of either kind
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Missing);
        }
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    pub fn decode_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        match self.decode(token)? {
            TokenClaims::Access(claims) => Ok(claims),
            other => {
                tracing::debug!(sub = other.subject(), "refresh token presented as access token");
                Err(TokenError::WrongKind)
            }
        }
    }

    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        match self.decode(token)? {
            TokenClaims::Refresh(claims) => Ok(claims),
            other => {
                tracing::debug!(sub = other.subject(), "access token presented as refresh token");
                Err(TokenError::WrongKind)
            }
        }
    }
}
