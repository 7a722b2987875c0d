// Database Connection Management
//
// Handles PostgreSQL connection pooling using tokio-postgres and deadpool. Every
// store call runs under `DatabaseConnection::timed` so an unresponsive server
// cannot hang a request.
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;

use crate::config::parse_var;
use crate::database::StoreError;

/// Database configuration
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub max_size: usize,
    pub tls: bool,
    pub timeouts: deadpool_postgres::Timeouts,
    /// Upper bound for a single store call
    pub query_timeout: Duration,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("dbname", &self.dbname)
            .field("max_size", &self.max_size)
            .field("tls", &self.tls)
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "postgres".to_string(),
            max_size: 16,
            tls: false,
            timeouts: default_timeouts(),
            query_timeout: Duration::from_secs(10),
        }
    }
}

fn default_timeouts() -> deadpool_postgres::Timeouts {
    deadpool_postgres::Timeouts {
        wait: Some(Duration::from_secs(30)),
        create: Some(Duration::from_secs(30)),
        recycle: Some(Duration::from_secs(30)),
    }
}

impl DatabaseConfig {
    /// Create configuration from a `postgres://` connection string
    pub fn from_url(url: &str) -> Result<Self> {
        let config = tokio_postgres::Config::from_str(url).context("Failed to parse DATABASE_URL")?;
        let defaults = Self::default();

        Ok(Self {
            host: config
                .get_hosts()
                .first()
                .map(|h| match h {
                    tokio_postgres::config::Host::Tcp(s) => s.clone(),
                    tokio_postgres::config::Host::Unix(s) => s.to_string_lossy().to_string(),
                })
                .unwrap_or(defaults.host),
            port: config.get_ports().first().copied().unwrap_or(defaults.port),
            user: config.get_user().map(str::to_string).unwrap_or(defaults.user),
            password: config
                .get_password()
                .map(|p| String::from_utf8_lossy(p).to_string())
                .unwrap_or_default(),
            dbname: config.get_dbname().map(str::to_string).unwrap_or(defaults.dbname),
            ..defaults
        })
    }

    /// Read `DATABASE_URL`, falling back to the discrete `PG_*` variables
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            Some(url) => Self::from_url(&url)?,
            None => {
                let defaults = Self::default();
                Self {
                    host: lookup("PG_HOST").unwrap_or(defaults.host),
                    port: parse_var(lookup, "PG_PORT")?.unwrap_or(defaults.port),
                    user: lookup("PG_USER").unwrap_or(defaults.user),
                    password: lookup("PG_PASSWORD").unwrap_or_default(),
                    dbname: lookup("PG_DBNAME").unwrap_or(defaults.dbname),
                    ..defaults
                }
            }
        };

        if let Some(max_size) = parse_var(lookup, "DATABASE_MAX_CONNECTIONS")? {
            config.max_size = max_size;
        }
        if let Some(tls) = parse_var(lookup, "DATABASE_TLS")? {
            config.tls = tls;
        }
        if let Some(secs) = parse_var(lookup, "DATABASE_QUERY_TIMEOUT_SECS")? {
            config.query_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Database connection wrapper
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: Pool,
    query_timeout: Duration,
}

impl DatabaseConnection {
    /// Create a new database connection with the provided configuration
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let masked_host = format!("{}:{}/{}", config.host, config.port, config.dbname);
        tracing::info!("🔌 Connecting to database: {}", masked_host);

        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.dbname(&config.dbname);
        pg_config.connect_timeout(config.query_timeout);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = if config.tls {
            let tls_connector = TlsConnector::builder()
                .build()
                .context("Failed to build TLS connector")?;
            Manager::from_config(pg_config, MakeTlsConnector::new(tls_connector), mgr_config)
        } else {
            Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
        };

        let pool = Pool::builder(mgr)
            .max_size(config.max_size)
            .wait_timeout(config.timeouts.wait)
            .create_timeout(config.timeouts.create)
            .recycle_timeout(config.timeouts.recycle)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .context("Failed to create database pool")?;

        let connection = Self {
            pool,
            query_timeout: config.query_timeout,
        };
        connection
            .health_check()
            .await
            .context("Failed to test database connection")?;

        tracing::info!("✅ Database connection established successfully");
        Ok(connection)
    }

    /// Check out a pooled client
    pub async fn client(&self) -> Result<Object, StoreError> {
        self.timed(async { Ok(self.pool.get().await?) }).await
    }

    /// Run a store operation under the configured timeout
    pub async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.query_timeout)),
        }
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.timed(async {
            let client = self.pool.get().await?;
            client.query_one("SELECT 1", &[]).await?;
            Ok(())
        })
        .await
    }

    /// Get database connection statistics
    pub fn stats(&self) -> ConnectionStats {
        let status = self.pool.status();
        ConnectionStats {
            size: status.size as u32,
            idle: status.available,
        }
    }
}

/// Database connection statistics
#[derive(Debug, serde::Serialize)]
pub struct ConnectionStats {
    pub size: u32,
    pub idle: usize,
}
