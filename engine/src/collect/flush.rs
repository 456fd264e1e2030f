//! Bottom halves: the acknowledgement write and finish event for one settled
//! answer, kept together and emitted in the order answers were settled.

use serde::Serialize;
use serde_json::Value;

use crate::game::Game;
use crate::hooks::GameEvent;
use crate::prompt::{Prompt, PromptInstance};
use crate::transaction::Transaction;

struct PendingUnit {
    index: usize,
    raw: Option<Value>,
    result: Option<Value>,
}

#[derive(Default)]
pub(crate) struct BottomHalves {
    units: Vec<PendingUnit>,
}

impl BottomHalves {
    pub fn push<O: Serialize>(&mut self, index: usize, raw: Option<Value>, result: Option<&O>) {
        self.units.push(PendingUnit {
            index,
            raw,
            result: event_value(result),
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Emit every buffered unit, oldest first, and clear the buffer.
    pub fn flush<P: Prompt>(
        &mut self,
        game: &Game,
        transaction: &Transaction,
        instances: &[PromptInstance<P>],
    ) {
        for unit in self.units.drain(..) {
            acknowledge(
                game,
                transaction,
                &instances[unit.index],
                unit.raw.as_ref(),
                unit.result.as_ref(),
            );
        }
    }
}

/// Write the acknowledgement to every connected seat, then report the finish.
pub(crate) fn acknowledge<P: Prompt>(
    game: &Game,
    transaction: &Transaction,
    instance: &PromptInstance<P>,
    raw: Option<&Value>,
    result: Option<&Value>,
) {
    game.broadcast(&instance.correlation().ack(), raw.unwrap_or(&Value::Null));
    game.hooks().emit(&GameEvent::PromptFinished {
        transaction,
        prompt: instance.view(),
        raw,
        result,
    });
}

/// Results travel to hooks as JSON so observers need not know the prompt type.
pub(crate) fn event_value<O: Serialize>(result: Option<&O>) -> Option<Value> {
    let result = result?;
    match serde_json::to_value(result) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Prompt result is not serializable: {e}");
            None
        }
    }
}
