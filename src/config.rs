//! Configuration module for environment variables and application settings

use std::env;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Duration;

use crate::database::DatabaseConfig;

/// Secret used outside production when no key is configured
const DEV_JWT_SECRET: &str = "dev_secret";

/// Deployment profile selected with `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("default") | Some("development") => Ok(Self::Development),
            Some("production") => Ok(Self::Production),
            Some("testing") => Ok(Self::Testing),
            Some(other) => Err(anyhow!("Unknown APP_ENV '{}'", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        }
    }

    /// Access token lifetime for the profile
    fn default_access_ttl(&self) -> Duration {
        match self {
            Self::Testing => Duration::minutes(5),
            Self::Development | Self::Production => Duration::seconds(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    /// Server configuration
    pub server: ServerConfig,

    /// Token signing and lifetimes
    pub jwt: JwtConfig,

    /// Refresh cookie attributes
    pub cookie: CookieConfig,

    /// Allowed browser origins
    pub cors_origins: Vec<String>,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Directory holding the `*.sql` query files
    pub sql_dir: PathBuf,

    /// JSON document describing the API operations
    pub api_docs_path: PathBuf,

    /// Login attempts allowed per client within the window
    pub login_rate_limit: RateLimitConfig,

    /// Hash submitted passwords with SHA-256 before the credential check
    pub hash_passwords: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Set the `Secure` attribute; must be true behind TLS
    pub secure: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: StdDuration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: StdDuration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::parse(lookup("APP_ENV").as_deref())?;

        let secret = lookup("JWT_SECRET_KEY")
            .or_else(|| lookup("SECRET_KEY"))
            .filter(|s| !s.is_empty());
        let secret = match (secret, environment) {
            (Some(secret), _) => secret,
            (None, Environment::Production) => {
                bail!("JWT_SECRET_KEY or SECRET_KEY is required in production")
            }
            (None, _) => DEV_JWT_SECRET.to_string(),
        };

        let access_ttl = match parse_var::<i64, _>(&lookup, "JWT_ACCESS_TTL_SECS")? {
            Some(secs) => ttl_from_secs("JWT_ACCESS_TTL_SECS", secs)?,
            None => environment.default_access_ttl(),
        };
        let refresh_ttl = match parse_var::<i64, _>(&lookup, "JWT_REFRESH_TTL_SECS")? {
            Some(secs) => ttl_from_secs("JWT_REFRESH_TTL_SECS", secs)?,
            None => Duration::days(7),
        };
        if access_ttl <= Duration::zero() || refresh_ttl <= Duration::zero() {
            bail!("Token lifetimes must be positive");
        }

        let secure = parse_var::<bool, _>(&lookup, "COOKIE_SECURE")?
            .unwrap_or(environment == Environment::Production);

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None if environment == Environment::Production => Vec::new(),
            None => [
                "http://localhost:3000",
                "http://localhost:5173",
                "http://127.0.0.1:3000",
                "http://127.0.0.1:5173",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        };

        let port = match parse_var::<u16, _>(&lookup, "PORT")? {
            Some(port) => port,
            None => parse_var(&lookup, "SERVER_PORT")?.unwrap_or(5000),
        };

        let login_rate_limit = RateLimitConfig {
            max_requests: parse_var(&lookup, "LOGIN_RATE_LIMIT_MAX")?.unwrap_or(5),
            window: StdDuration::from_secs(
                parse_var(&lookup, "LOGIN_RATE_LIMIT_WINDOW_SECS")?.unwrap_or(300),
            ),
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
            },
            jwt: JwtConfig {
                secret,
                access_ttl,
                refresh_ttl,
            },
            cookie: CookieConfig { secure },
            cors_origins,
            database: DatabaseConfig::from_lookup(&lookup)?,
            sql_dir: lookup("SQL_DIR").unwrap_or_else(|| "sql".to_string()).into(),
            api_docs_path: lookup("API_DOCS_PATH")
                .unwrap_or_else(|| "docs/api.yaml".to_string())
                .into(),
            login_rate_limit,
            hash_passwords: parse_var(&lookup, "HASH_PASSWORDS")?.unwrap_or(false),
        })
    }
}

fn ttl_from_secs(key: &str, secs: i64) -> Result<Duration> {
    match Duration::try_seconds(secs) {
        Some(ttl) => Ok(ttl),
        None => bail!("{} is out of range: {}", key, secs),
    }
}

/// Parse an optional variable, failing loudly on malformed values
pub(crate) fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}", key)),
        _ => Ok(None),
    }
}
