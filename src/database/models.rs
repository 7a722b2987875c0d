// Database Models
//
// Tokio-postgres compatible models for the users, games and market tables.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_postgres::Row;

/// Trait for converting from tokio-postgres Row
pub trait FromRow {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error>
    where
        Self: Sized;
}

/// Role assigned when a user row carries none
pub const DEFAULT_ROLE: &str = "user";

// ============================================================================
// USER MODELS
// ============================================================================

/// Account row from `nba.dim_users`; managed outside this service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl FromRow for User {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: optional_i64(row, "id")?,
            email: row.try_get("email")?,
            name: row
                .try_get::<_, Option<String>>("username")
                .ok()
                .flatten()
                .unwrap_or_default(),
            role: row
                .try_get::<_, Option<String>>("user_rol")
                .ok()
                .flatten()
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        })
    }
}

// ============================================================================
// GAME MODELS
// ============================================================================

/// Header row for a single game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: i64,
    pub game_date: String,
    pub home_team: String,
    pub home_team_id: i64,
    pub home_score: i64,
    pub away_team: String,
    pub away_team_id: i64,
    pub away_score: i64,
}

impl FromRow for GameSummary {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: required_i64(row, "id")?,
            game_date: text_of(row, "game_date"),
            home_team: text_of(row, "home_team"),
            home_team_id: required_i64(row, "home_team_id")?,
            home_score: optional_i64(row, "home_score")?.unwrap_or_default(),
            away_team: text_of(row, "away_team"),
            away_team_id: required_i64(row, "away_team_id")?,
            away_score: optional_i64(row, "away_score")?.unwrap_or_default(),
        })
    }
}

/// Per-side leaders shown in the daily scoreboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamLeaders {
    pub team: String,
    pub team_short: String,
    pub team_id: String,
    pub score: i64,
    pub best_fantasy_pointer: String,
    pub best_fantasy_pointer_points: String,
    pub best_scorer: String,
    pub best_scorer_points: i64,
    pub best_rebounder: String,
    pub best_rebounder_rebounds: i64,
    pub best_assister: String,
    pub best_assister_assists: i64,
}

impl TeamLeaders {
    fn from_row_side(row: &Row, side: &str) -> Result<Self, tokio_postgres::Error> {
        let col = |name: &str| format!("{}_{}", side, name);
        Ok(Self {
            team: text_of(row, &col("team")),
            team_short: text_of(row, &col("team_short")),
            team_id: text_of(row, &col("team_id")),
            score: optional_i64(row, &col("score"))?.unwrap_or_default(),
            best_fantasy_pointer: text_of(row, &col("best_fantasy_pointer")),
            best_fantasy_pointer_points: text_of(row, &col("best_fantasy_pointer_points")),
            best_scorer: text_of(row, &col("best_scorer")),
            best_scorer_points: optional_i64(row, &col("best_scorer_points"))?.unwrap_or_default(),
            best_rebounder: text_of(row, &col("best_rebounder")),
            best_rebounder_rebounds: optional_i64(row, &col("best_rebounder_rebounds"))?
                .unwrap_or_default(),
            best_assister: text_of(row, &col("best_assister")),
            best_assister_assists: optional_i64(row, &col("best_assister_assists"))?
                .unwrap_or_default(),
        })
    }
}

/// One game from the by-date scoreboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateGame {
    pub game_id: i64,
    /// `YYYY-MM-DD HH:MM:SS`, or `None` when the row has no date
    pub date: Option<String>,
    pub home: TeamLeaders,
    pub away: TeamLeaders,
}

impl FromRow for DateGame {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        let date = match column_value(row, "game_date")? {
            Value::String(s) => Some(s),
            _ => None,
        };
        Ok(Self {
            game_id: required_i64(row, "game_id")?,
            date,
            home: TeamLeaders::from_row_side(row, "home")?,
            away: TeamLeaders::from_row_side(row, "away")?,
        })
    }
}

// ============================================================================
// MARKET MODELS
// ============================================================================

/// A resolved player move between two teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub player_id: i64,
    pub old_team_id: i64,
    pub new_team_id: i64,
}

/// Row counts written by a committed trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub players_updated: u64,
    pub transactions_recorded: u64,
}

// ============================================================================
// ROW HELPERS
// ============================================================================

/// Render a row as a JSON object keyed by column name
pub fn row_to_json(row: &Row) -> Result<Map<String, Value>, tokio_postgres::Error> {
    let mut object = Map::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), value_at(row, idx)?);
    }
    Ok(object)
}

fn value_at(row: &Row, idx: usize) -> Result<Value, tokio_postgres::Error> {
    let value = match row.columns()[idx].type_().name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        "int2" => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::from(v as f64)),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)?
            .and_then(|d| d.to_f64())
            .map(Value::from),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::from(d.format("%Y-%m-%d").to_string())),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|d| Value::from(d.format("%Y-%m-%d %H:%M:%S").to_string())),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|d| Value::from(d.format("%Y-%m-%d %H:%M:%S").to_string())),
        "json" | "jsonb" => row.try_get::<_, Option<Value>>(idx)?,
        _ => row.try_get::<_, Option<String>>(idx).ok().flatten().map(Value::from),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn column_value(row: &Row, name: &str) -> Result<Value, tokio_postgres::Error> {
    match row.columns().iter().position(|c| c.name() == name) {
        Some(idx) => value_at(row, idx),
        None => Ok(Value::Null),
    }
}

/// Integer column of any width, `None` for NULL or a missing column
fn optional_i64(row: &Row, name: &str) -> Result<Option<i64>, tokio_postgres::Error> {
    Ok(json_to_i64(&column_value(row, name)?))
}

fn required_i64(row: &Row, name: &str) -> Result<i64, tokio_postgres::Error> {
    match optional_i64(row, name)? {
        Some(value) => Ok(value),
        // Surface the driver's own error for the missing/NULL column
        None => row.try_get::<_, i64>(name),
    }
}

/// Any column rendered the way it reads in a JSON payload
fn text_of(row: &Row, name: &str) -> String {
    column_value(row, name)
        .map(|v| json_to_text(&v))
        .unwrap_or_default()
}

pub(crate) fn json_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn json_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
