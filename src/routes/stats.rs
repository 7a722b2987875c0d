//! Game and player statistics.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::middleware;
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::auth::middleware::require_json;
use crate::database::models::{DateGame, GameSummary, TeamLeaders, json_to_i64};
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct GameStatsRequest {
    /// Numeric id, also accepted as a numeric string
    pub game_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DateStatsRequest {
    /// `YYYY-MM-DD`
    pub game_date: Option<String>,
}

/// Game header as served; team ids are rendered as strings
#[derive(Debug, Serialize)]
pub struct GameInfo {
    pub game_id: i64,
    pub date: String,
    pub home_team: String,
    pub home_team_id: String,
    pub home_score: i64,
    pub away_team: String,
    pub away_team_id: String,
    pub away_score: i64,
}

impl From<&GameSummary> for GameInfo {
    fn from(game: &GameSummary) -> Self {
        Self {
            game_id: game.id,
            date: game.game_date.clone(),
            home_team: game.home_team.clone(),
            home_team_id: game.home_team_id.to_string(),
            home_score: game.home_score,
            away_team: game.away_team.clone(),
            away_team_id: game.away_team_id.to_string(),
            away_score: game.away_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GameStatsResponse {
    pub game_info: GameInfo,
    pub home_players: Vec<Map<String, Value>>,
    pub away_players: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct DateStatsResponse {
    pub games_count: usize,
    pub date: String,
    pub games_info: Vec<Map<String, Value>>,
}

fn insert_side(object: &mut Map<String, Value>, side: &str, leaders: &TeamLeaders) {
    let fields = [
        ("team", json!(leaders.team)),
        ("team_short", json!(leaders.team_short)),
        ("team_id", json!(leaders.team_id)),
        ("score", json!(leaders.score)),
        ("best_fantasy_pointer", json!(leaders.best_fantasy_pointer)),
        ("best_fantasy_pointer_points", json!(leaders.best_fantasy_pointer_points)),
        ("best_scorer", json!(leaders.best_scorer)),
        ("best_scorer_points", json!(leaders.best_scorer_points)),
        ("best_rebounder", json!(leaders.best_rebounder)),
        ("best_rebounder_rebounds", json!(leaders.best_rebounder_rebounds)),
        ("best_assister", json!(leaders.best_assister)),
        ("best_assister_assists", json!(leaders.best_assister_assists)),
    ];
    for (name, value) in fields {
        object.insert(format!("{}_{}", side, name), value);
    }
}

/// Flat scoreboard entry: `game_id`, `date`, then `home_*` and `away_*` columns
fn scoreboard_entry(game: &DateGame) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("game_id".to_string(), json!(game.game_id));
    object.insert("date".to_string(), json!(game.date));
    insert_side(&mut object, "home", &game.home);
    insert_side(&mut object, "away", &game.away);
    object
}

/// POST /by-game
pub async fn game_stats(
    State(state): State<AppState>,
    payload: Result<Json<GameStatsRequest>, JsonRejection>,
) -> Result<Json<GameStatsResponse>, ApiError> {
    let Json(payload) = payload.map_err(|_| ApiError::validation("No data sent"))?;
    let raw = payload.game_id.unwrap_or(Value::Null);
    let Some(game_id) = json_to_i64(&raw) else {
        return Err(ApiError::validation(format!("Invalid game_id: {}", raw)));
    };

    if !state.stats.game_exists(game_id).await? {
        tracing::info!(game_id, "unknown game requested");
        return Err(ApiError::validation(format!("Invalid game_id: {}", game_id)));
    }

    let Some(game) = state.stats.game_summary(game_id).await? else {
        return Err(ApiError::not_found("Game not found"));
    };
    tracing::debug!(game_id, "loading player lines");

    let home_players = state.stats.players_for_team(game_id, game.home_team_id).await?;
    let away_players = state.stats.players_for_team(game_id, game.away_team_id).await?;

    Ok(Json(GameStatsResponse {
        game_info: GameInfo::from(&game),
        home_players,
        away_players,
    }))
}

/// POST /by-date
pub async fn date_stats(
    State(state): State<AppState>,
    payload: Result<Json<DateStatsRequest>, JsonRejection>,
) -> Result<Json<DateStatsResponse>, ApiError> {
    let Json(payload) = payload.map_err(|_| ApiError::validation("No data sent"))?;
    let raw = payload.game_date.unwrap_or_default();
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("Invalid game_date: {}", raw)))?;

    let games = state.stats.games_on_date(date).await?;
    if games.is_empty() {
        return Err(ApiError::not_found("No game for this date"));
    }
    tracing::info!(%date, count = games.len(), "scoreboard served");

    Ok(Json(DateStatsResponse {
        games_count: games.len(),
        date: date.format("%Y-%m-%d").to_string(),
        games_info: games.iter().map(scoreboard_entry).collect(),
    }))
}

pub fn create_stats_routes() -> Router<AppState> {
    Router::new()
        .route("/by-game", post(game_stats))
        .route("/by-date", post(date_stats))
        .layer(middleware::from_fn(require_json))
}
