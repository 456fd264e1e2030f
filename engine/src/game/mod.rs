//! The game session actor.
//!
//! A [`Game`] is one running match. It owns the sync counter that every
//! correlation tag and reveal draws from, the termination signal collections
//! watch, and the ambient binding that lets nested helpers find it without a
//! parameter. [`Game::run`] drives it from Created through Running to Ended.

mod lifecycle;
mod manager;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use arbiter_config::EngineConfig;
use arbiter_types::{GameId, ParticipantId, ParticipantSnapshot, sync_tag};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::error::GameError;
use crate::hooks::{EventHooks, NullHooks};
use crate::participant::Participant;
use crate::transaction::TransactionScope;

pub use lifecycle::{ActionProcessor, GameExit, GameServices, Step, spawn};
pub use manager::{GameManager, GameStats, Lobby, NullLobby, NullStats, StatsSink, TracingStats};

tokio::task_local! {
    static CURRENT_GAME: Weak<Game>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Created,
    Running,
    Ended,
}

pub struct Game {
    id: GameId,
    config: EngineConfig,
    manager: Arc<GameManager>,
    participants: Vec<Arc<dyn Participant>>,
    hooks: RwLock<Arc<dyn EventHooks>>,
    state: Mutex<GameState>,
    sync: AtomicU64,
    shutdown: watch::Sender<bool>,
    lobby_released: AtomicBool,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("participants", &self.participants.len())
            .field("sync", &self.sync_tags_issued())
            .field("terminating", &self.is_terminating())
            .finish_non_exhaustive()
    }
}

impl Game {
    pub fn new(
        manager: Arc<GameManager>,
        participants: Vec<Arc<dyn Participant>>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: manager.game_id(),
            config,
            manager,
            participants,
            hooks: RwLock::new(Arc::new(NullHooks)),
            state: Mutex::new(GameState::Created),
            sync: AtomicU64::new(0),
            shutdown: watch::Sender::new(false),
            lobby_released: AtomicBool::new(false),
        })
    }

    /// The game bound to the current task, if any.
    #[must_use]
    pub fn current() -> Option<Arc<Game>> {
        CURRENT_GAME.try_with(Weak::upgrade).ok().flatten()
    }

    /// Run `fut` with this game as the ambient current game.
    pub fn scope<F: Future>(self: &Arc<Self>, fut: F) -> impl Future<Output = F::Output> + use<F> {
        CURRENT_GAME.scope(Arc::downgrade(self), fut)
    }

    #[must_use]
    pub fn id(&self) -> GameId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<GameManager> {
        &self.manager
    }

    /// Seats in the order the lobby created them.
    #[must_use]
    pub fn participants(&self) -> &[Arc<dyn Participant>] {
        &self.participants
    }

    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&Arc<dyn Participant>> {
        self.participants.iter().find(|p| p.id() == id)
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<ParticipantSnapshot> {
        self.participants.iter().map(|p| p.snapshot()).collect()
    }

    #[must_use]
    pub fn state(&self) -> GameState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: GameState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    #[must_use]
    pub fn hooks(&self) -> Arc<dyn EventHooks> {
        Arc::clone(&self.hooks.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the event hooks. [`Game::run`] binds the hooks from its services.
    pub fn set_hooks(&self, hooks: Arc<dyn EventHooks>) {
        *self.hooks.write().unwrap_or_else(PoisonError::into_inner) = hooks;
    }

    /// Next sync value. Values start at 1 and never repeat within a game.
    ///
    /// Once termination has been requested this returns
    /// [`GameError::Terminating`] instead; callers abandon whatever they were
    /// about to send and unwind.
    pub fn next_sync_tag(&self) -> Result<u64, GameError> {
        if self.is_terminating() {
            return Err(GameError::Terminating);
        }
        Ok(self.sync.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// How many sync values have been handed out.
    #[must_use]
    pub fn sync_tags_issued(&self) -> u64 {
        self.sync.load(Ordering::Acquire)
    }

    pub(crate) fn reset_sync(&self) {
        self.sync.store(0, Ordering::Release);
    }

    #[must_use]
    pub fn is_terminating(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Ask the game to stop. A collection in progress finishes as if its
    /// deadline had passed; the next sync request fails with `Terminating`.
    pub fn terminate(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!(game = %self.id, "Game termination requested");
        }
    }

    /// Resolves once termination has been requested.
    pub async fn terminated(&self) {
        let mut shutdown = self.shutdown.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag is set.
        let _ = shutdown.wait_for(|terminating| *terminating).await;
    }

    /// Yield for at least `duration`.
    pub async fn pause(&self, duration: Duration) {
        sleep(duration).await;
    }

    /// Write a frame to every connected human seat. Delivery failures are
    /// logged and otherwise ignored.
    pub fn broadcast(&self, tag: &str, payload: &Value) {
        for participant in self.participants.iter().filter(|p| !p.is_synthetic()) {
            if let Err(e) = participant.deliver(tag, payload) {
                tracing::debug!(participant = %participant.id(), tag, "Broadcast skipped: {e}");
            }
        }
    }

    /// Send `payload` privately to one participant under a fresh sync tag.
    ///
    /// Synthetic seats consume a sync value without receiving anything.
    pub fn reveal(&self, participant: &dyn Participant, payload: &Value) -> Result<u64, GameError> {
        let n = self.next_sync_tag()?;
        if !participant.is_synthetic()
            && let Err(e) = participant.deliver(&sync_tag(n), payload)
        {
            tracing::warn!(participant = %participant.id(), sync = n, "Reveal not delivered: {e}");
        }
        Ok(n)
    }

    /// Open a transaction that several input calls can share.
    pub fn begin_transaction(
        &self,
        name: impl Into<String>,
        participants: Vec<ParticipantId>,
    ) -> TransactionScope {
        TransactionScope::begin(self.hooks(), name, participants)
    }

    /// Hand the lobby its end-of-match notification. Only the first call
    /// does anything.
    pub(crate) fn release_lobby(&self, lobby: &dyn Lobby) {
        if self.lobby_released.swap(true, Ordering::AcqRel) {
            return;
        }
        lobby.end_game(&self.manager);
        tracing::info!(game = %self.id, "Lobby notified of game end");
    }
}

/// [`Game::reveal`] on the game bound to the current task.
pub fn reveal(participant: &dyn Participant, payload: &Value) -> Result<u64, GameError> {
    Game::current()
        .ok_or(GameError::NoCurrentGame)?
        .reveal(participant, payload)
}

/// [`Game::broadcast`] on the game bound to the current task.
pub fn broadcast(tag: &str, payload: &Value) -> Result<(), GameError> {
    Game::current()
        .ok_or(GameError::NoCurrentGame)?
        .broadcast(tag, payload);
    Ok(())
}
