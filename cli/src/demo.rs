//! High card: the small rule set the binary plays.
//!
//! Each round every seat is dealt the same hand and picks a card under the
//! `all` policy; the highest card takes the round. The match closes with an
//! `any` prompt where the first seat to claim the pot gets it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arbiter_engine::{
    ActionProcessor, ClientEnd, CorrelationTag, Game, GameError, GameManager, Inputlet, Lobby,
    Participant, ParticipantId, Prompt, PromptError, Step, SyntheticParticipant,
};
use serde_json::{Value, json};

const CLAIM_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Prompts
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChooseCard {
    hand: Vec<u8>,
    choice: Option<u8>,
}

impl ChooseCard {
    pub fn new(hand: Vec<u8>) -> Self {
        Self { hand, choice: None }
    }
}

impl Inputlet for ChooseCard {
    fn tag(&self) -> &str {
        "ChooseCard"
    }

    fn payload(&self) -> Value {
        json!({ "hand": self.hand })
    }

    fn data(&self) -> Option<Value> {
        self.choice.map(Value::from)
    }
}

impl Prompt for ChooseCard {
    type Output = u8;

    fn parse(&self, raw: Option<&Value>) -> Result<Option<u8>, PromptError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let card = raw
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| PromptError::parse_failure(self.tag(), format!("not a card: {raw}")))?;
        if !self.hand.contains(&card) {
            return Err(PromptError::parse_failure(
                self.tag(),
                format!("card {card} is not in hand"),
            ));
        }
        Ok(Some(card))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClaimPot {
    claimed: bool,
}

impl Inputlet for ClaimPot {
    fn tag(&self) -> &str {
        "ClaimPot"
    }

    fn data(&self) -> Option<Value> {
        self.claimed.then_some(Value::Bool(true))
    }
}

impl Prompt for ClaimPot {
    type Output = bool;

    fn parse(&self, raw: Option<&Value>) -> Result<Option<bool>, PromptError> {
        // Declining is no answer, so only a claim can win.
        Ok(raw.and_then(Value::as_bool).filter(|claimed| *claimed))
    }
}

// ============================================================================
// Seats
// ============================================================================

/// Synthetic seat: always plays its highest card and always claims.
pub fn bot(id: &str) -> Arc<dyn Participant> {
    Arc::new(SyntheticParticipant::new(id, |_trans, prompt| {
        if let Some(choose) = prompt.downcast_mut::<ChooseCard>() {
            choose.choice = choose.hand.iter().max().copied();
        } else if let Some(claim) = prompt.downcast_mut::<ClaimPot>() {
            claim.claimed = true;
        }
    }))
}

/// Plays the remote end of a network seat: answers every request frame and
/// ignores acknowledgements and reveals.
pub async fn run_client(mut client: ClientEnd) {
    while let Some(frame) = client.recv().await {
        let Ok(tag) = CorrelationTag::parse(&frame.tag) else {
            tracing::debug!(tag = %frame.tag, "Client received frame");
            continue;
        };
        let answer = match tag.prompt_tag() {
            "ChooseCard" => frame.payload["hand"][0].clone(),
            "ClaimPot" => Value::Bool(true),
            _ => Value::Null,
        };
        if let Err(e) = client.respond(&frame.tag, answer) {
            tracing::warn!(%tag, "Client could not answer: {e}");
            break;
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLobby;

impl Lobby for LoggingLobby {
    fn start_game(&self, manager: &GameManager) {
        tracing::info!(
            game = %manager.game_id(),
            items = ?manager.consumed_items(),
            "Lobby: game started"
        );
    }

    fn end_game(&self, manager: &GameManager) {
        tracing::info!(game = %manager.game_id(), "Lobby: game ended");
    }
}

// ============================================================================
// Rules
// ============================================================================

pub enum Action {
    Deal { round: u64, remaining: u64 },
    Claim,
}

#[derive(Debug, Default)]
pub struct HighCard {
    rounds_played: u64,
    wins: BTreeMap<ParticipantId, u64>,
    pot: Option<ParticipantId>,
}

fn deal(round: u64) -> Vec<u8> {
    (1..=5u64)
        .map(|slot| ((slot * 7 + round * 3) % 13 + 1) as u8)
        .collect()
}

impl HighCard {
    async fn play_round(&mut self, game: &Arc<Game>, round: u64) -> Result<(), GameError> {
        let seats = game.participants().to_vec();
        let hand = deal(round);
        for seat in &seats {
            game.reveal(seat.as_ref(), &json!({ "round": round, "hand": hand }))?;
        }

        let ids = seats.iter().map(|seat| seat.id().clone()).collect();
        let scope = game.begin_transaction(format!("Round{round}"), ids);
        let picks = game
            .input_all(&seats, &ChooseCard::new(hand), None, Some(scope.transaction()))
            .await?;

        let winner = picks
            .iter()
            .filter_map(|(seat, card)| card.map(|card| (seat, *card)))
            .max_by_key(|(_, card)| *card);
        match winner {
            Some((seat, card)) => {
                tracing::info!(round, winner = %seat.id(), card, "Round won");
                *self.wins.entry(seat.id().clone()).or_default() += 1;
            }
            None => tracing::info!(round, "Nobody played a card"),
        }
        self.rounds_played += 1;
        Ok(())
    }
}

impl ActionProcessor for HighCard {
    type Action = Action;

    fn bootstrap(&mut self, params: &Value, _items: &[String]) -> Result<Action, GameError> {
        let rounds = params["rounds"].as_u64().unwrap_or(1).max(1);
        Ok(Action::Deal {
            round: 1,
            remaining: rounds,
        })
    }

    async fn process(
        &mut self,
        game: &Arc<Game>,
        action: Action,
    ) -> Result<Step<Action>, GameError> {
        match action {
            Action::Deal { round, remaining } => {
                self.play_round(game, round).await?;
                Ok(Step::Continue(if remaining > 1 {
                    Action::Deal {
                        round: round + 1,
                        remaining: remaining - 1,
                    }
                } else {
                    Action::Claim
                }))
            }
            Action::Claim => {
                let seats = game.participants().to_vec();
                let claim = game
                    .input_any(&seats, &ClaimPot::default(), Some(CLAIM_TIMEOUT), None)
                    .await?;
                self.pot = claim.map(|(seat, _)| seat.id().clone());
                tracing::info!(pot = ?self.pot, "Pot claimed");
                Ok(Step::GameEnded)
            }
        }
    }

    fn stats(&self) -> Value {
        json!({
            "rounds": self.rounds_played,
            "wins": self.wins,
            "pot": self.pot,
        })
    }
}
