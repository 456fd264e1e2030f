//! Input collection.
//!
//! One call asks a group of participants the same prompt and gathers their
//! answers under a completion [`Policy`]:
//!
//! - `single`: exactly one participant; the bare result comes back.
//! - `all`: every participant answers or times out; results come back in
//!   request order.
//! - `any`: the first non-empty result wins and the remaining waiters are
//!   cancelled.
//!
//! Every participant is settled exactly once. Whoever has not answered when the
//! loop exits (deadline, winner, or game termination) is parsed with an empty
//! answer and acknowledged with `null`.

mod flush;
mod waiter;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use std::vec;

use arbiter_types::{CorrelationTag, ParticipantId, Policy};
use tokio::time::{Instant, timeout_at};

use crate::error::GameError;
use crate::game::Game;
use crate::hooks::GameEvent;
use crate::participant::Participant;
use crate::prompt::{Prompt, PromptInstance};
use crate::transaction::Transaction;

use flush::{BottomHalves, acknowledge, event_value};
use waiter::WaiterSet;

/// Answers from an `all` collection, in request order.
#[derive(Debug, Clone)]
pub struct AllAnswers<O> {
    entries: Vec<(Arc<dyn Participant>, Option<O>)>,
}

impl<O> AllAnswers<O> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Participants in request order.
    pub fn ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.entries.iter().map(|(p, _)| p.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<dyn Participant>, Option<&O>)> {
        self.entries.iter().map(|(p, o)| (p, o.as_ref()))
    }

    /// The answer given by `id`, if it answered.
    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<&O> {
        self.entries
            .iter()
            .find(|(p, _)| p.id() == id)
            .and_then(|(_, o)| o.as_ref())
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<(Arc<dyn Participant>, Option<O>)> {
        self.entries
    }
}

impl<O> IntoIterator for AllAnswers<O> {
    type Item = (Arc<dyn Participant>, Option<O>);
    type IntoIter = vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Winner of an `any` collection. `None` means nobody answered usefully.
pub type AnyAnswer<O> = Option<(Arc<dyn Participant>, O)>;

/// Result of [`Game::user_input`], shaped by the policy that produced it.
#[derive(Debug, Clone)]
pub enum Collected<O> {
    Single(Option<O>),
    All(AllAnswers<O>),
    Any(AnyAnswer<O>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Exhausted,
    Deadline,
    Winner,
    Terminated,
    Fault,
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exhausted => "exhausted",
            Self::Deadline => "deadline",
            Self::Winner => "winner",
            Self::Terminated => "terminated",
            Self::Fault => "fault",
        })
    }
}

/// Every participant's settled result in request order, plus the `any` winner.
struct Settlement<O> {
    entries: Vec<(Arc<dyn Participant>, Option<O>)>,
    winner: Option<usize>,
}

impl<O> Settlement<O> {
    fn into_single(self) -> Option<O> {
        self.entries.into_iter().next().and_then(|(_, o)| o)
    }

    fn into_all(self) -> AllAnswers<O> {
        AllAnswers {
            entries: self.entries,
        }
    }

    fn into_any(self) -> AnyAnswer<O> {
        let winner = self.winner?;
        let (participant, result) = self.entries.into_iter().nth(winner)?;
        Some((participant, result?))
    }

    fn into_collected(self, policy: Policy) -> Collected<O> {
        match policy {
            Policy::Single => Collected::Single(self.into_single()),
            Policy::All => Collected::All(self.into_all()),
            Policy::Any => Collected::Any(self.into_any()),
        }
    }
}

impl Game {
    /// Ask `participants` the prompt under `policy`.
    ///
    /// `timeout` defaults to the configured input timeout. Without a
    /// `transaction`, one scoped to this call is opened and closed around it.
    pub async fn user_input<P: Prompt>(
        self: &Arc<Self>,
        participants: &[Arc<dyn Participant>],
        prompt: &P,
        policy: Policy,
        timeout: Option<Duration>,
        transaction: Option<&Transaction>,
    ) -> Result<Collected<P::Output>, GameError> {
        let settlement = self
            .collect(participants, prompt, policy, timeout, transaction)
            .await?;
        Ok(settlement.into_collected(policy))
    }

    pub async fn input_single<P: Prompt>(
        self: &Arc<Self>,
        participant: &Arc<dyn Participant>,
        prompt: &P,
        timeout: Option<Duration>,
        transaction: Option<&Transaction>,
    ) -> Result<Option<P::Output>, GameError> {
        let participants = [Arc::clone(participant)];
        let settlement = self
            .collect(&participants, prompt, Policy::Single, timeout, transaction)
            .await?;
        Ok(settlement.into_single())
    }

    pub async fn input_all<P: Prompt>(
        self: &Arc<Self>,
        participants: &[Arc<dyn Participant>],
        prompt: &P,
        timeout: Option<Duration>,
        transaction: Option<&Transaction>,
    ) -> Result<AllAnswers<P::Output>, GameError> {
        let settlement = self
            .collect(participants, prompt, Policy::All, timeout, transaction)
            .await?;
        Ok(settlement.into_all())
    }

    pub async fn input_any<P: Prompt>(
        self: &Arc<Self>,
        participants: &[Arc<dyn Participant>],
        prompt: &P,
        timeout: Option<Duration>,
        transaction: Option<&Transaction>,
    ) -> Result<AnyAnswer<P::Output>, GameError> {
        let settlement = self
            .collect(participants, prompt, Policy::Any, timeout, transaction)
            .await?;
        Ok(settlement.into_any())
    }

    async fn collect<P: Prompt>(
        self: &Arc<Self>,
        participants: &[Arc<dyn Participant>],
        prompt: &P,
        policy: Policy,
        timeout: Option<Duration>,
        transaction: Option<&Transaction>,
    ) -> Result<Settlement<P::Output>, GameError> {
        if policy == Policy::Single && participants.len() != 1 {
            return Err(GameError::InvalidRequest(format!(
                "single-policy input needs exactly one participant, got {}",
                participants.len()
            )));
        }

        let scope;
        let transaction = match transaction {
            Some(transaction) => transaction,
            None => {
                let ids = participants.iter().map(|p| p.id().clone()).collect();
                scope = self.begin_transaction(prompt.tag(), ids);
                scope.transaction()
            }
        };

        let timeout = timeout.unwrap_or(self.config().default_timeout());
        let mut instances = Vec::with_capacity(participants.len());
        for participant in participants {
            let tag = CorrelationTag::new(policy, prompt.tag(), self.next_sync_tag()?);
            instances.push(PromptInstance::new(
                prompt.clone(),
                participant.id().clone(),
                timeout,
                tag,
            ));
        }

        let mut waiters = WaiterSet::spawn(self, transaction, participants, &instances);
        let hooks = self.hooks();
        for instance in &instances {
            hooks.emit(&GameEvent::PromptStarted {
                transaction,
                prompt: instance.view(),
            });
        }

        let deadline = Instant::now() + timeout + self.config().grace();
        let escalate = self.config().debug();
        // Outer `None`: not settled yet.
        let mut slots: Vec<Option<Option<P::Output>>> =
            participants.iter().map(|_| None).collect();
        let mut halves = BottomHalves::default();
        let mut winner = None;
        let mut fault = None;

        let exit = loop {
            let completion = tokio::select! {
                biased;
                () = self.terminated() => break LoopExit::Terminated,
                next = timeout_at(deadline, waiters.next()) => match next {
                    Err(_) => break LoopExit::Deadline,
                    Ok(None) => break LoopExit::Exhausted,
                    Ok(Some(completion)) => completion,
                },
            };

            let instance = &mut instances[completion.index];
            if let Some(answered_prompt) = completion.prompt {
                instance.replace_prompt(answered_prompt);
            }
            let result = match instance.settle(completion.raw.as_ref(), escalate) {
                Ok(result) => result,
                Err(e) => {
                    fault = Some(e);
                    break LoopExit::Fault;
                }
            };

            let useful = result.is_some();
            halves.push(completion.index, completion.raw, result.as_ref());
            slots[completion.index] = Some(result);

            if policy.flushes_eagerly() {
                halves.flush(self, transaction, &instances);
            } else if useful {
                winner = Some(completion.index);
                break LoopExit::Winner;
            }
        };

        let cancelled = waiters.cancel().await;
        halves.flush(self, transaction, &instances);
        tracing::debug!(
            game = %self.id(),
            %policy,
            prompt = prompt.tag(),
            %exit,
            cancelled,
            "Input collection loop exited"
        );
        if let Some(e) = fault {
            return Err(e);
        }

        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_some() {
                continue;
            }
            let instance = &instances[index];
            let result = instance.settle(None, escalate)?;
            acknowledge(
                self,
                transaction,
                instance,
                None,
                event_value(result.as_ref()).as_ref(),
            );
            *slot = Some(result);
        }

        let entries = participants
            .iter()
            .cloned()
            .zip(slots.into_iter().map(Option::flatten))
            .collect();
        Ok(Settlement { entries, winner })
    }
}

/// [`Game::user_input`] on the game bound to the current task.
pub async fn user_input<P: Prompt>(
    participants: &[Arc<dyn Participant>],
    prompt: &P,
    policy: Policy,
    timeout: Option<Duration>,
    transaction: Option<&Transaction>,
) -> Result<Collected<P::Output>, GameError> {
    current_game()?
        .user_input(participants, prompt, policy, timeout, transaction)
        .await
}

/// [`Game::input_single`] on the game bound to the current task.
pub async fn input_single<P: Prompt>(
    participant: &Arc<dyn Participant>,
    prompt: &P,
    timeout: Option<Duration>,
    transaction: Option<&Transaction>,
) -> Result<Option<P::Output>, GameError> {
    current_game()?
        .input_single(participant, prompt, timeout, transaction)
        .await
}

/// [`Game::input_all`] on the game bound to the current task.
pub async fn input_all<P: Prompt>(
    participants: &[Arc<dyn Participant>],
    prompt: &P,
    timeout: Option<Duration>,
    transaction: Option<&Transaction>,
) -> Result<AllAnswers<P::Output>, GameError> {
    current_game()?
        .input_all(participants, prompt, timeout, transaction)
        .await
}

/// [`Game::input_any`] on the game bound to the current task.
pub async fn input_any<P: Prompt>(
    participants: &[Arc<dyn Participant>],
    prompt: &P,
    timeout: Option<Duration>,
    transaction: Option<&Transaction>,
) -> Result<AnyAnswer<P::Output>, GameError> {
    current_game()?
        .input_any(participants, prompt, timeout, transaction)
        .await
}

fn current_game() -> Result<Arc<Game>, GameError> {
    Game::current().ok_or(GameError::NoCurrentGame)
}
