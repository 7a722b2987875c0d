//! Administrative roster tools, restricted to the `admin` role.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::middleware;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::AccessClaims;
use crate::auth::middleware::{AuthMiddleware, require_json};
use crate::database::Trade;
use crate::error::ApiError;
use crate::server::AppState;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub player_name: Option<String>,
    pub old_team_name: Option<String>,
    pub new_team_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub msg: String,
    pub player_id: i64,
    pub player_name: String,
    pub old_team_name: String,
    pub old_team_id: i64,
    pub new_team_name: String,
    pub new_team_id: i64,
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::validation(format!("{} is required", name)))
}

/// POST /trade-tool
///
/// Moves a player from one team to another and records the market
/// transaction in the same database transaction.
pub async fn trade_tool(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<TradeResponse>, ApiError> {
    let Json(payload) = payload.map_err(|_| ApiError::validation("No data sent"))?;
    let player_name = required(payload.player_name, "player_name")?;
    let old_team_name = required(payload.old_team_name, "old_team_name")?;
    let new_team_name = required(payload.new_team_name, "new_team_name")?;

    let Some(old_team_id) = state.trades.team_id(&old_team_name).await? else {
        return Err(ApiError::not_found(format!("Team not found: {}", old_team_name)));
    };
    let Some(new_team_id) = state.trades.team_id(&new_team_name).await? else {
        return Err(ApiError::not_found(format!("Team not found: {}", new_team_name)));
    };
    let Some(player_id) = state.trades.player_id(&player_name, old_team_id).await? else {
        tracing::info!(player = %player_name, old_team_id, "no player found on team");
        return Err(ApiError::not_found(format!(
            "No player found for {} in team {}",
            player_name, old_team_name
        )));
    };

    let trade = Trade {
        player_id,
        old_team_id,
        new_team_id,
    };
    let outcome = state.trades.execute_trade(&trade).await?;
    tracing::info!(
        admin = %claims.sub,
        player_id,
        old_team_id,
        new_team_id,
        updated = outcome.players_updated,
        recorded = outcome.transactions_recorded,
        "trade committed"
    );

    Ok(Json(TradeResponse {
        msg: "Updated done successfully".to_string(),
        player_id,
        player_name,
        old_team_name,
        old_team_id,
        new_team_name,
        new_team_id,
    }))
}

pub fn create_admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/trade-tool", post(trade_tool))
        .layer(middleware::from_fn_with_state(ADMIN_ROLE, AuthMiddleware::require_role))
        .layer(middleware::from_fn_with_state(
            state.jwt_service.clone(),
            AuthMiddleware::require_access_token,
        ))
        .layer(middleware::from_fn(require_json))
}
