//! Store traits and their PostgreSQL implementation.
//!
//! Handlers depend on the traits so the HTTP layer can be exercised against
//! in-memory stores; [`PgStore`] is the production implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::database::models::{
    DateGame, FromRow, GameSummary, Trade, TradeOutcome, User, row_to_json,
};
use crate::database::{DatabaseConnection, QueryCatalog, StoreError};

/// Read-only access to the user table
#[async_trait]
pub trait UserStore: Send + Sync {
    /// The user whose email and credential hash both match, if any
    async fn authenticate(&self, email: &str, password_hash: &str)
    -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// Game and player statistics
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn game_exists(&self, game_id: i64) -> Result<bool, StoreError>;

    async fn game_summary(&self, game_id: i64) -> Result<Option<GameSummary>, StoreError>;

    /// Box-score lines for one side of a game, one JSON object per player
    async fn players_for_team(
        &self,
        game_id: i64,
        team_id: i64,
    ) -> Result<Vec<Map<String, Value>>, StoreError>;

    async fn games_on_date(&self, date: NaiveDate) -> Result<Vec<DateGame>, StoreError>;
}

/// Roster moves between teams
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn team_id(&self, name: &str) -> Result<Option<i64>, StoreError>;

    async fn player_id(&self, name: &str, team_id: i64) -> Result<Option<i64>, StoreError>;

    /// Move the player and record the market transaction atomically
    async fn execute_trade(&self, trade: &Trade) -> Result<TradeOutcome, StoreError>;
}

/// PostgreSQL-backed implementation of every store trait
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
    queries: Arc<QueryCatalog>,
}

impl PgStore {
    pub fn new(db: DatabaseConnection, queries: Arc<QueryCatalog>) -> Self {
        Self { db, queries }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn decode<T: FromRow>(row: &tokio_postgres::Row) -> Result<T, StoreError> {
        T::from_row(row).map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// First column of an optional single-row lookup as an id
    async fn lookup_id(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Option<i64>, StoreError> {
        let sql = self.queries.get(query)?;
        self.db
            .timed(async {
                let client = self.db.client().await?;
                let row = client.query_opt(&*sql, params).await?;
                Ok(row.and_then(|r| r.try_get::<_, i64>("id").ok()))
            })
            .await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn authenticate(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let count_sql = self.queries.get("login_query")?;
        let user_sql = self.queries.get("get_user_info")?;
        tracing::info!(email, "checking credentials");

        self.db
            .timed(async {
                let client = self.db.client().await?;

                // Existence check first so a failed attempt never reads the row
                let row = client.query_one(&*count_sql, &[&email, &password_hash]).await?;
                let count: i64 = row.try_get("count")?;
                if count == 0 {
                    tracing::warn!(email, "credentials rejected");
                    return Ok(None);
                }

                let user = client
                    .query_opt(&*user_sql, &[&email, &password_hash])
                    .await?
                    .map(|r| Self::decode::<User>(&r))
                    .transpose()?;
                tracing::info!(email, found = user.is_some(), "credentials accepted");
                Ok(user)
            })
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = self.queries.get("get_user_by_email")?;
        self.db
            .timed(async {
                let client = self.db.client().await?;
                client
                    .query_opt(&*sql, &[&email])
                    .await?
                    .map(|r| Self::decode::<User>(&r))
                    .transpose()
            })
            .await
    }
}

#[async_trait]
impl StatsStore for PgStore {
    async fn game_exists(&self, game_id: i64) -> Result<bool, StoreError> {
        let sql = self.queries.get("validate_game_id")?;
        self.db
            .timed(async {
                let client = self.db.client().await?;
                let row = client.query_one(&*sql, &[&game_id]).await?;
                let count: i64 = row.try_get("count")?;
                Ok(count > 0)
            })
            .await
    }

    async fn game_summary(&self, game_id: i64) -> Result<Option<GameSummary>, StoreError> {
        let sql = self.queries.get("get_total_game_info")?;
        self.db
            .timed(async {
                let client = self.db.client().await?;
                client
                    .query_opt(&*sql, &[&game_id])
                    .await?
                    .map(|r| Self::decode::<GameSummary>(&r))
                    .transpose()
            })
            .await
    }

    async fn players_for_team(
        &self,
        game_id: i64,
        team_id: i64,
    ) -> Result<Vec<Map<String, Value>>, StoreError> {
        let sql = self.queries.get("get_players_info")?;
        self.db
            .timed(async {
                let client = self.db.client().await?;
                let rows = client.query(&*sql, &[&game_id, &team_id]).await?;
                rows.iter()
                    .map(|r| row_to_json(r).map_err(|e| StoreError::Decode(e.to_string())))
                    .collect()
            })
            .await
    }

    async fn games_on_date(&self, date: NaiveDate) -> Result<Vec<DateGame>, StoreError> {
        let sql = self.queries.get("get_total_date_info")?;
        self.db
            .timed(async {
                let client = self.db.client().await?;
                let rows = client.query(&*sql, &[&date]).await?;
                rows.iter().map(Self::decode::<DateGame>).collect()
            })
            .await
    }
}

#[async_trait]
impl TradeStore for PgStore {
    async fn team_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
        self.lookup_id("get_team_id", &[&name]).await
    }

    async fn player_id(&self, name: &str, team_id: i64) -> Result<Option<i64>, StoreError> {
        self.lookup_id("get_player_id", &[&name, &team_id]).await
    }

    async fn execute_trade(&self, trade: &Trade) -> Result<TradeOutcome, StoreError> {
        let update_sql = self.queries.get("update_player_id")?;
        let insert_sql = self.queries.get("insert_market_transaction")?;

        self.db
            .timed(async {
                let mut client = self.db.client().await?;
                // Dropping an uncommitted transaction rolls it back
                let tx = client.transaction().await?;

                let players_updated = tx
                    .execute(&*update_sql, &[&trade.new_team_id, &trade.player_id])
                    .await?;
                tracing::info!(players_updated, "player team updated");

                let transactions_recorded = tx
                    .execute(
                        &*insert_sql,
                        &[&trade.player_id, &trade.old_team_id, &trade.new_team_id],
                    )
                    .await?;
                tracing::info!(transactions_recorded, "market transaction recorded");

                tx.commit().await?;
                Ok(TradeOutcome {
                    players_updated,
                    transactions_recorded,
                })
            })
            .await
    }
}
