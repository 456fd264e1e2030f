//! Concurrency core for Arbiter - game sessions and multi-participant input.
//!
//! A [`Game`] drives one match: it runs the rules' [`ActionProcessor`], hands
//! out sync values, and lets the rules ask groups of [`Participant`]s a
//! [`Prompt`] under a single/all/any completion policy. Participants are either
//! network seats behind a [`Transport`] or synthetic seats answering locally.

mod collect;
mod error;
mod game;
mod hooks;
mod participant;
mod prompt;
mod transaction;
mod transport;

// Re-export from crates for public API
pub use arbiter_config::EngineConfig;
pub use arbiter_types::{
    CorrelationTag, GameId, ParticipantId, ParticipantSnapshot, Policy, Presence, TagError,
    sync_tag,
};

// ============================================================================
// Collection
// ============================================================================

pub use collect::{
    AllAnswers, AnyAnswer, Collected, input_all, input_any, input_single, user_input,
};

// ============================================================================
// Session
// ============================================================================

pub use game::{
    ActionProcessor, Game, GameExit, GameManager, GameServices, GameState, GameStats, Lobby,
    NullLobby, NullStats, StatsSink, Step, TracingStats, broadcast, reveal, spawn,
};

// ============================================================================
// Participants, prompts and plumbing
// ============================================================================

pub use error::{GameError, PromptError, TransportError};
pub use hooks::{EventHooks, GameEvent, HookChain, NullHooks, TracingHooks};
pub use participant::{
    AnswerFut, AnswerRequest, NetworkParticipant, Participant, Resolver, SyntheticParticipant,
};
pub use prompt::{Inputlet, Prompt, PromptInstance, PromptView};
pub use transaction::{Transaction, TransactionScope};
pub use transport::{ChannelTransport, ClientEnd, Frame, Transport, TransportFut};
