//! Session lifecycle.
//!
//! ```text
//! Created ──start──> Running ──(conclusion | termination | fault | panic)──> Ended
//! ```
//!
//! Leaving `Running` always goes through a `Teardown` guard, which marks the game
//! ended and releases it from the lobby exactly once.

use std::future::Future;
use std::sync::{Arc, PoisonError};

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{Game, GameState, GameStats, Lobby, NullLobby, NullStats, StatsSink};
use crate::error::GameError;
use crate::hooks::{EventHooks, NullHooks};

/// Outcome of one processed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<A> {
    /// Keep going with the next action.
    Continue(A),
    /// The match is over. This is a normal conclusion, not an error.
    GameEnded,
}

/// How a game that did not fault left the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameExit {
    Concluded,
    Terminated,
}

/// The game's rules, driven by the session one action at a time.
pub trait ActionProcessor: Send {
    type Action: Send;

    /// Build the first action from the match parameters and consumed items.
    fn bootstrap(&mut self, params: &Value, items: &[String]) -> Result<Self::Action, GameError>;

    /// Resolve one action. Input collection happens in here.
    fn process(
        &mut self,
        game: &Arc<Game>,
        action: Self::Action,
    ) -> impl Future<Output = Result<Step<Self::Action>, GameError>> + Send;

    /// Rule-specific statistics reported when the game concludes.
    fn stats(&self) -> Value {
        Value::Null
    }
}

/// Collaborators a running game reports to.
#[derive(Clone)]
pub struct GameServices {
    pub lobby: Arc<dyn Lobby>,
    pub hooks: Arc<dyn EventHooks>,
    pub stats: Arc<dyn StatsSink>,
}

impl Default for GameServices {
    fn default() -> Self {
        Self {
            lobby: Arc::new(NullLobby),
            hooks: Arc::new(NullHooks),
            stats: Arc::new(NullStats),
        }
    }
}

impl GameServices {
    pub fn with_lobby(mut self, lobby: Arc<dyn Lobby>) -> Self {
        self.lobby = lobby;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn EventHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsSink>) -> Self {
        self.stats = stats;
        self
    }
}

struct Teardown<'a> {
    game: &'a Game,
    lobby: &'a dyn Lobby,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.game.set_state(GameState::Ended);
        self.game.release_lobby(self.lobby);
    }
}

impl Game {
    /// Run the game to its end on the current task.
    ///
    /// Termination is not an error: it yields `Ok(GameExit::Terminated)`. Any
    /// other processor failure is returned after teardown has run.
    pub async fn run<R: ActionProcessor>(
        self: &Arc<Self>,
        processor: R,
        services: GameServices,
    ) -> Result<GameExit, GameError> {
        self.scope(self.drive(processor, services)).await
    }

    async fn drive<R: ActionProcessor>(
        self: &Arc<Self>,
        mut processor: R,
        services: GameServices,
    ) -> Result<GameExit, GameError> {
        self.start(&services)?;
        let started_at = Utc::now();

        let outcome = {
            let _teardown = Teardown {
                game: self,
                lobby: services.lobby.as_ref(),
            };
            self.play(&mut processor).await
        };

        if self.state() != GameState::Ended {
            return Err(GameError::NotEnded);
        }

        match outcome {
            Ok(()) => {
                tracing::info!(game = %self.id, "Game concluded");
                services.stats.record(GameStats {
                    game_id: self.id,
                    participants: self.snapshots(),
                    started_at,
                    ended_at: Utc::now(),
                    sync_tags_issued: self.sync_tags_issued(),
                    rules: processor.stats(),
                });
                Ok(GameExit::Concluded)
            }
            Err(GameError::Terminating) => {
                tracing::info!(game = %self.id, "Game terminated");
                Ok(GameExit::Terminated)
            }
            Err(e) => {
                tracing::error!(game = %self.id, "Game failed: {e}");
                Err(e)
            }
        }
    }

    fn start(self: &Arc<Self>, services: &GameServices) -> Result<(), GameError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != GameState::Created {
                return Err(GameError::InvalidRequest(format!(
                    "game {} cannot start from {state:?}",
                    self.id
                )));
            }
            *state = GameState::Running;
        }

        self.reset_sync();
        self.set_hooks(Arc::clone(&services.hooks));
        if !self.manager.attach(self) {
            tracing::warn!(game = %self.id, "Game manager already has a game attached");
        }
        services.lobby.start_game(&self.manager);
        tracing::info!(
            game = %self.id,
            participants = self.participants.len(),
            "Game started"
        );
        Ok(())
    }

    async fn play<R: ActionProcessor>(
        self: &Arc<Self>,
        processor: &mut R,
    ) -> Result<(), GameError> {
        let mut action =
            processor.bootstrap(self.manager.params(), self.manager.consumed_items())?;
        loop {
            if self.is_terminating() {
                return Err(GameError::Terminating);
            }
            match processor.process(self, action).await? {
                Step::Continue(next) => action = next,
                Step::GameEnded => return Ok(()),
            }
        }
    }
}

/// Run `game` on its own task.
pub fn spawn<R>(
    game: Arc<Game>,
    processor: R,
    services: GameServices,
) -> JoinHandle<Result<GameExit, GameError>>
where
    R: ActionProcessor + 'static,
{
    tokio::spawn(async move { game.run(processor, services).await })
}
