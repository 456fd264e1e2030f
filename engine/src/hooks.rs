//! Event hooks.
//!
//! The engine reports prompt and transaction progress as [`GameEvent`]s. What
//! observers do with them (UI sync, replays, statistics) is their business;
//! hooks must not block.

use std::sync::Arc;

use serde_json::Value;

use crate::prompt::PromptView;
use crate::transaction::Transaction;

#[derive(Clone, Copy)]
pub enum GameEvent<'a> {
    TransactionBegin {
        transaction: &'a Transaction,
    },
    TransactionEnd {
        transaction: &'a Transaction,
    },
    /// A participant has been asked.
    PromptStarted {
        transaction: &'a Transaction,
        prompt: &'a PromptView,
    },
    /// A participant's answer is settled.
    ///
    /// `raw` is what was acknowledged on the wire (`None` for timeouts and
    /// lost connections); `result` is the post-processed answer.
    PromptFinished {
        transaction: &'a Transaction,
        prompt: &'a PromptView,
        raw: Option<&'a Value>,
        result: Option<&'a Value>,
    },
}

impl GameEvent<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransactionBegin { .. } => "transaction_begin",
            Self::TransactionEnd { .. } => "transaction_end",
            Self::PromptStarted { .. } => "prompt_started",
            Self::PromptFinished { .. } => "prompt_finished",
        }
    }
}

pub trait EventHooks: Send + Sync {
    fn emit(&self, event: &GameEvent<'_>);
}

/// Hooks that ignore everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl EventHooks for NullHooks {
    fn emit(&self, _event: &GameEvent<'_>) {}
}

/// Fans events out to several hooks, in registration order.
#[derive(Default, Clone)]
pub struct HookChain(Vec<Arc<dyn EventHooks>>);

impl HookChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, hooks: Arc<dyn EventHooks>) -> Self {
        self.0.push(hooks);
        self
    }
}

impl EventHooks for HookChain {
    fn emit(&self, event: &GameEvent<'_>) {
        for hooks in &self.0 {
            hooks.emit(event);
        }
    }
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl EventHooks for TracingHooks {
    fn emit(&self, event: &GameEvent<'_>) {
        match event {
            GameEvent::TransactionBegin { transaction }
            | GameEvent::TransactionEnd { transaction } => {
                tracing::debug!(event = event.name(), transaction = transaction.name());
            }
            GameEvent::PromptStarted { prompt, .. } => {
                tracing::debug!(
                    event = event.name(),
                    actor = %prompt.actor(),
                    tag = %prompt.correlation(),
                );
            }
            GameEvent::PromptFinished { prompt, result, .. } => {
                tracing::debug!(
                    event = event.name(),
                    actor = %prompt.actor(),
                    tag = %prompt.correlation(),
                    answered = result.is_some(),
                );
            }
        }
    }
}
