//! In-memory stores and request helpers shared by the router tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tower::ServiceExt;

use crate::config::{Config, Environment, JwtConfig};
use crate::database::{
    DateGame, GameSummary, StatsStore, StoreError, Trade, TradeOutcome, TradeStore, User, UserStore,
};
use crate::docs::ApiDocs;
use crate::server::{AppState, build_router};

pub const SECRET: &str = "test-secret";

#[derive(Default)]
pub struct MemoryStore {
    /// `(user, credential hash)`
    users: Mutex<Vec<(User, String)>>,
    fail: AtomicBool,
    games: Mutex<HashMap<i64, GameSummary>>,
    players: Mutex<HashMap<(i64, i64), Vec<Map<String, Value>>>>,
    dates: Mutex<HashMap<NaiveDate, Vec<DateGame>>>,
    teams: Mutex<HashMap<String, i64>>,
    rosters: Mutex<HashMap<(String, i64), i64>>,
    pub trades: Mutex<Vec<Trade>>,
}

impl MemoryStore {
    pub fn with_user(self, id: i64, email: &str, name: &str, role: &str, hash: &str) -> Self {
        self.users.lock().push((
            User {
                id: Some(id),
                email: email.to_string(),
                name: name.to_string(),
                role: role.to_string(),
            },
            hash.to_string(),
        ));
        self
    }

    pub fn remove_user(&self, email: &str) {
        self.users.lock().retain(|(u, _)| u.email != email);
    }

    pub fn rename_user(&self, email: &str, name: &str, role: &str) {
        for (user, _) in self.users.lock().iter_mut() {
            if user.email == email {
                user.name = name.to_string();
                user.role = role.to_string();
            }
        }
    }

    /// Make every subsequent call fail as if the database were down
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn with_game(self, game: GameSummary, home: Vec<Map<String, Value>>, away: Vec<Map<String, Value>>) -> Self {
        self.players.lock().insert((game.id, game.home_team_id), home);
        self.players.lock().insert((game.id, game.away_team_id), away);
        self.games.lock().insert(game.id, game);
        self
    }

    pub fn with_date(self, date: NaiveDate, games: Vec<DateGame>) -> Self {
        self.dates.lock().insert(date, games);
        self
    }

    pub fn with_team(self, name: &str, id: i64) -> Self {
        self.teams.lock().insert(name.to_string(), id);
        self
    }

    pub fn with_player(self, name: &str, team_id: i64, id: i64) -> Self {
        self.rosters.lock().insert((name.to_string(), team_id), id);
        self
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Timeout(std::time::Duration::from_secs(10)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn authenticate(&self, email: &str, password_hash: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .iter()
            .find(|(u, h)| u.email == email && h == password_hash)
            .map(|(u, _)| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .iter()
            .find(|(u, _)| u.email == email)
            .map(|(u, _)| u.clone()))
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn game_exists(&self, game_id: i64) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.games.lock().contains_key(&game_id))
    }

    async fn game_summary(&self, game_id: i64) -> Result<Option<GameSummary>, StoreError> {
        self.check()?;
        Ok(self.games.lock().get(&game_id).cloned())
    }

    async fn players_for_team(&self, game_id: i64, team_id: i64) -> Result<Vec<Map<String, Value>>, StoreError> {
        self.check()?;
        Ok(self
            .players
            .lock()
            .get(&(game_id, team_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn games_on_date(&self, date: NaiveDate) -> Result<Vec<DateGame>, StoreError> {
        self.check()?;
        Ok(self.dates.lock().get(&date).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn team_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
        self.check()?;
        Ok(self.teams.lock().get(name).copied())
    }

    async fn player_id(&self, name: &str, team_id: i64) -> Result<Option<i64>, StoreError> {
        self.check()?;
        Ok(self.rosters.lock().get(&(name.to_string(), team_id)).copied())
    }

    async fn execute_trade(&self, trade: &Trade) -> Result<TradeOutcome, StoreError> {
        self.check()?;
        let mut rosters = self.rosters.lock();
        let key = rosters
            .iter()
            .find(|(_, id)| **id == trade.player_id)
            .map(|(k, _)| k.clone());
        if let Some((name, _)) = key {
            rosters.retain(|_, id| *id != trade.player_id);
            rosters.insert((name, trade.new_team_id), trade.player_id);
        }
        self.trades.lock().push(*trade);
        Ok(TradeOutcome {
            players_updated: 1,
            transactions_recorded: 1,
        })
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_lookup(|key| match key {
        "JWT_SECRET_KEY" => Some(SECRET.to_string()),
        _ => None,
    })
    .expect("test config");
    config.environment = Environment::Testing;
    config.jwt = JwtConfig {
        secret: SECRET.to_string(),
        access_ttl: Duration::seconds(20),
        refresh_ttl: Duration::days(7),
    };
    config
}

/// Router over `store` plus the state it was built from
pub fn test_app(store: Arc<MemoryStore>) -> (Router, AppState) {
    test_app_with(store, test_config())
}

pub fn test_app_with(store: Arc<MemoryStore>, config: Config) -> (Router, AppState) {
    let state = AppState::new(&config, store.clone(), store.clone(), store, ApiDocs::default());
    (build_router(state.clone(), &config.cors_origins), state)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().expect("header value"),
    );
    req
}

pub fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
    req.headers_mut()
        .insert(header::COOKIE, cookie.parse().expect("header value"));
    req
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<String>, Value) {
    let response: Response<Body> = app.clone().oneshot(req).await.expect("infallible");
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, cookies, body)
}

/// `name=value` pair of the named cookie from a list of Set-Cookie headers
pub fn cookie_pair(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .and_then(|c| c.split(';').next())
        .map(str::to_string)
}
