//! One waiter task per prompted participant.

use std::collections::HashMap;
use std::sync::Arc;

use arbiter_types::CorrelationTag;
use serde_json::Value;
use tokio::task::{Id, JoinSet};

use crate::game::Game;
use crate::participant::{AnswerRequest, Participant};
use crate::prompt::{Prompt, PromptInstance};
use crate::transaction::Transaction;

/// What a waiter hands back: the raw answer and the prompt clone it answered
/// against. `prompt` is `None` only when the waiter task itself failed.
pub(crate) struct Completion<P> {
    pub index: usize,
    pub raw: Option<Value>,
    pub prompt: Option<P>,
}

pub(crate) struct WaiterSet<P> {
    tasks: JoinSet<Completion<P>>,
    indices: HashMap<Id, usize>,
}

impl<P: Prompt> WaiterSet<P> {
    /// Spawn one waiter per participant. Each waiter runs bound to `game`.
    pub fn spawn(
        game: &Arc<Game>,
        transaction: &Transaction,
        participants: &[Arc<dyn Participant>],
        instances: &[PromptInstance<P>],
    ) -> Self {
        let mut tasks = JoinSet::new();
        let mut indices = HashMap::with_capacity(participants.len());
        for (index, (participant, instance)) in participants.iter().zip(instances).enumerate() {
            let waiter = wait_for_answer(
                index,
                Arc::clone(participant),
                transaction.clone(),
                instance.prompt().clone(),
                instance.correlation().clone(),
            );
            let handle = tasks.spawn(game.scope(waiter));
            indices.insert(handle.id(), index);
        }
        Self { tasks, indices }
    }

    /// Next finished waiter, in completion order. `None` once all are consumed.
    ///
    /// A waiter that panicked resolves as "no answer" for its participant.
    pub async fn next(&mut self) -> Option<Completion<P>> {
        loop {
            match self.tasks.join_next_with_id().await? {
                Ok((id, completion)) => {
                    self.indices.remove(&id);
                    return Some(completion);
                }
                Err(e) => {
                    let Some(index) = self.indices.remove(&e.id()) else {
                        tracing::warn!("Untracked input waiter failed: {e}");
                        continue;
                    };
                    tracing::warn!(index, "Input waiter failed: {e}");
                    return Some(Completion {
                        index,
                        raw: None,
                        prompt: None,
                    });
                }
            }
        }
    }

    /// Abort every waiter still outstanding. Results that race in during the
    /// abort are discarded. Returns how many waiters were outstanding.
    pub async fn cancel(mut self) -> usize {
        let outstanding = self.tasks.len();
        self.tasks.shutdown().await;
        outstanding
    }
}

async fn wait_for_answer<P: Prompt>(
    index: usize,
    participant: Arc<dyn Participant>,
    transaction: Transaction,
    mut prompt: P,
    tag: CorrelationTag,
) -> Completion<P> {
    let answer = participant
        .answer(AnswerRequest {
            transaction: &transaction,
            prompt: &mut prompt,
            tag: &tag,
        })
        .await;
    let raw = match answer {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(participant = %participant.id(), %tag, "No answer: {e}");
            None
        }
    };
    Completion {
        index,
        raw,
        prompt: Some(prompt),
    }
}
