//! Prompt (inputlet) contract.
//!
//! A prompt is a typed question template. The collector clones it once per
//! participant, so mutable per-answer state on a prompt never aliases across
//! seats. [`Inputlet`] is the object-safe part participants and hooks see;
//! [`Prompt`] adds the typed parse / post-process steps the collector drives.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use arbiter_types::{CorrelationTag, ParticipantId};
use serde::Serialize;
use serde_json::Value;

use crate::error::{GameError, PromptError};

pub trait Inputlet: Any + Send + Sync {
    /// Prompt type tag, embedded in correlation tags (e.g. `"ChooseCard"`).
    fn tag(&self) -> &str;

    /// Body sent to a network client along with the request tag.
    fn payload(&self) -> Value {
        Value::Null
    }

    /// Answer computed locally by a synthetic participant, in the same raw
    /// shape a network client would send.
    fn data(&self) -> Option<Value> {
        None
    }
}

impl dyn Inputlet {
    /// Access the concrete prompt behind a trait object.
    pub fn downcast_ref<T: Inputlet>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref()
    }

    /// Mutable access to the concrete prompt, used by synthetic resolvers to
    /// record their choice before [`Inputlet::data`] is read.
    pub fn downcast_mut<T: Inputlet>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self;
        any.downcast_mut()
    }
}

pub trait Prompt: Inputlet + Clone {
    type Output: Serialize + Clone + fmt::Debug + Send + Sync + 'static;

    /// Turn a raw answer into a result. `None` means the participant gave no
    /// answer (timeout, disconnect, or an explicit empty reply).
    fn parse(&self, raw: Option<&Value>) -> Result<Option<Self::Output>, PromptError>;

    /// Hook run on every parsed result, including synthesized timeouts.
    fn post_process(
        &self,
        actor: &ParticipantId,
        parsed: Option<Self::Output>,
    ) -> Option<Self::Output> {
        let _ = actor;
        parsed
    }
}

/// A prompt bound to one participant for one collection.
///
/// The prompt sits last so a `&PromptInstance<P>` coerces to a
/// `&PromptInstance<dyn Inputlet>` for event hooks.
#[derive(Debug)]
pub struct PromptInstance<P: ?Sized> {
    actor: ParticipantId,
    timeout: Duration,
    tag: CorrelationTag,
    prompt: P,
}

/// Type-erased view of a prompt instance.
pub type PromptView = PromptInstance<dyn Inputlet>;

impl<P: ?Sized> PromptInstance<P> {
    #[must_use]
    pub fn actor(&self) -> &ParticipantId {
        &self.actor
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn correlation(&self) -> &CorrelationTag {
        &self.tag
    }

    #[must_use]
    pub fn prompt(&self) -> &P {
        &self.prompt
    }
}

impl<P: Prompt> PromptInstance<P> {
    pub(crate) fn new(
        prompt: P,
        actor: ParticipantId,
        timeout: Duration,
        tag: CorrelationTag,
    ) -> Self {
        Self {
            actor,
            timeout,
            tag,
            prompt,
        }
    }

    pub(crate) fn view(&self) -> &PromptView {
        self
    }

    /// Swap in the copy a synthetic participant filled in while answering.
    pub(crate) fn replace_prompt(&mut self, prompt: P) {
        self.prompt = prompt;
    }

    /// Parse and post-process a raw answer.
    ///
    /// A parse failure is logged and treated as no answer, unless `escalate`
    /// is set, in which case it becomes a fatal [`GameError::Parse`].
    pub(crate) fn settle(
        &self,
        raw: Option<&Value>,
        escalate: bool,
    ) -> Result<Option<P::Output>, GameError> {
        let parsed = match self.prompt.parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(actor = %self.actor, tag = %self.tag, "Prompt parse failed: {e}");
                if escalate {
                    return Err(e.into());
                }
                None
            }
        };
        Ok(self.prompt.post_process(&self.actor, parsed))
    }
}
