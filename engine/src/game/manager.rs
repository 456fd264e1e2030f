//! Per-match manager and the lobby/stats collaborators around a game.

use std::sync::{Arc, OnceLock, Weak};

use arbiter_types::{GameId, ParticipantSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::Game;

/// What the lobby knows about one match: its id, rule parameters and the
/// items consumed to start it. The running game attaches itself here.
#[derive(Debug)]
pub struct GameManager {
    game_id: GameId,
    params: Value,
    consumed_items: Vec<String>,
    game: OnceLock<Weak<Game>>,
}

impl GameManager {
    pub fn new(game_id: GameId, params: Value) -> Self {
        Self {
            game_id,
            params,
            consumed_items: Vec::new(),
            game: OnceLock::new(),
        }
    }

    pub fn with_consumed_items(mut self, items: Vec<String>) -> Self {
        self.consumed_items = items;
        self
    }

    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    #[must_use]
    pub fn params(&self) -> &Value {
        &self.params
    }

    #[must_use]
    pub fn consumed_items(&self) -> &[String] {
        &self.consumed_items
    }

    /// The attached game, while it is alive.
    #[must_use]
    pub fn game(&self) -> Option<Arc<Game>> {
        self.game.get().and_then(Weak::upgrade)
    }

    /// Returns `false` if a game was already attached.
    pub(crate) fn attach(&self, game: &Arc<Game>) -> bool {
        self.game.set(Arc::downgrade(game)).is_ok()
    }
}

/// Match start/end notifications.
pub trait Lobby: Send + Sync {
    fn start_game(&self, manager: &GameManager);

    /// Called exactly once per started game, however it ends.
    fn end_game(&self, manager: &GameManager);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullLobby;

impl Lobby for NullLobby {
    fn start_game(&self, _manager: &GameManager) {}

    fn end_game(&self, _manager: &GameManager) {}
}

/// Final statistics of a concluded game.
#[derive(Debug, Clone, Serialize)]
pub struct GameStats {
    pub game_id: GameId,
    pub participants: Vec<ParticipantSnapshot>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub sync_tags_issued: u64,
    /// Whatever the action processor reports.
    pub rules: Value,
}

pub trait StatsSink: Send + Sync {
    fn record(&self, stats: GameStats);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl StatsSink for NullStats {
    fn record(&self, _stats: GameStats) {}
}

/// Logs the stats as one JSON line at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStats;

impl StatsSink for TracingStats {
    fn record(&self, stats: GameStats) {
        match serde_json::to_string(&stats) {
            Ok(json) => tracing::info!(game = %stats.game_id, stats = %json, "Game stats"),
            Err(e) => tracing::warn!(game = %stats.game_id, "Failed to serialize game stats: {e}"),
        }
    }
}
