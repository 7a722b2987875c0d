//! # Database Module
//!
//! PostgreSQL integration using tokio-postgres with a deadpool connection pool.
//! SQL text lives in `*.sql` files resolved through the [`QueryCatalog`]; the
//! stores in [`store`] are the only code that talks to the pool.

pub mod connection;
pub mod models;
pub mod queries;
pub mod store;

use std::time::Duration;

use thiserror::Error;

pub use connection::{DatabaseConfig, DatabaseConnection};
pub use models::*;
pub use queries::{QueryCatalog, QueryError};
pub use store::{PgStore, StatsStore, TradeStore, UserStore};

/// Failure talking to the backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to check out a database connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("database call exceeded {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Catalog(#[from] QueryError),
    #[error("unexpected row shape: {0}")]
    Decode(String),
}
