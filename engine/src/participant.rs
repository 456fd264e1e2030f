//! Participant contract and its two variants.
//!
//! A [`NetworkParticipant`] answers over a [`Transport`] that can be swapped on
//! reconnect. A [`SyntheticParticipant`] answers synchronously through an
//! injected resolver and never touches a transport.

use std::fmt;
use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arbiter_types::{CorrelationTag, ParticipantId, ParticipantSnapshot, Presence};
use serde_json::Value;

use crate::error::TransportError;
use crate::prompt::Inputlet;
use crate::transaction::Transaction;
use crate::transport::Transport;

/// Future returned by [`Participant::answer`]: the raw answer, possibly empty.
pub type AnswerFut<'a> =
    Pin<Box<dyn Future<Output = Result<Option<Value>, TransportError>> + Send + 'a>>;

/// Everything a participant needs to answer one prompt.
pub struct AnswerRequest<'a> {
    pub transaction: &'a Transaction,
    /// This participant's own clone of the prompt.
    pub prompt: &'a mut dyn Inputlet,
    pub tag: &'a CorrelationTag,
}

pub trait Participant: Send + Sync + fmt::Debug {
    fn id(&self) -> &ParticipantId;

    fn presence(&self) -> Presence;

    fn is_synthetic(&self) -> bool;

    /// Produce a raw answer for one prompt.
    ///
    /// A lost connection is reported as an error; the collector treats it
    /// exactly like a timeout.
    fn answer<'a>(&'a self, request: AnswerRequest<'a>) -> AnswerFut<'a>;

    /// Write a tagged frame to this participant. Synthetic seats discard it.
    fn deliver(&self, tag: &str, payload: &Value) -> Result<(), TransportError>;

    fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot {
            account: self.id().clone(),
            state: self.presence(),
        }
    }
}

/// Human seat behind a network connection.
pub struct NetworkParticipant {
    id: ParticipantId,
    transport: RwLock<Arc<dyn Transport>>,
    dropped: AtomicBool,
    fled: AtomicBool,
}

impl fmt::Debug for NetworkParticipant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkParticipant")
            .field("id", &self.id)
            .field("dropped", &self.is_dropped())
            .field("fled", &self.has_fled())
            .finish_non_exhaustive()
    }
}

impl NetworkParticipant {
    pub fn new(id: impl Into<ParticipantId>, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: id.into(),
            transport: RwLock::new(transport),
            dropped: AtomicBool::new(false),
            fled: AtomicBool::new(false),
        }
    }

    /// Current connection binding.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the connection binding and clear the dropped flag.
    ///
    /// Visible to the next transport attempt; a wait already in progress keeps
    /// the old connection and resolves when that one dies.
    pub fn reconnect(&self, transport: Arc<dyn Transport>) {
        *self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transport;
        self.dropped.store(false, Ordering::Release);
        tracing::info!(participant = %self.id, "Participant reconnected");
    }

    pub fn set_dropped(&self, dropped: bool) {
        self.dropped.store(dropped, Ordering::Release);
    }

    pub fn set_fled(&self, fled: bool) {
        self.fled.store(fled, Ordering::Release);
    }

    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn has_fled(&self) -> bool {
        self.fled.load(Ordering::Acquire)
    }
}

impl Participant for NetworkParticipant {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    fn presence(&self) -> Presence {
        if self.is_dropped() {
            if self.has_fled() {
                Presence::Fled
            } else {
                Presence::Dropped
            }
        } else if self.transport().is_connected() {
            Presence::InGame
        } else {
            Presence::Disconnected
        }
    }

    fn is_synthetic(&self) -> bool {
        false
    }

    fn answer<'a>(&'a self, request: AnswerRequest<'a>) -> AnswerFut<'a> {
        let transport = self.transport();
        let tag = request.tag.request();
        let payload = request.prompt.payload();
        Box::pin(async move {
            let reply = transport.await_tagged(&tag);
            transport
                .send(&tag, &payload)
                .map_err(|_| TransportError::ConnectionLost)?;
            let frame = reply.await?;
            tracing::debug!(participant = %self.id, tag = %frame.tag, "Received answer");
            Ok(match frame.payload {
                Value::Null => None,
                payload => Some(payload),
            })
        })
    }

    fn deliver(&self, tag: &str, payload: &Value) -> Result<(), TransportError> {
        self.transport().send(tag, payload)
    }
}

/// Resolver a synthetic seat uses to fill in its own prompt clone.
pub type Resolver = Arc<dyn Fn(&Transaction, &mut dyn Inputlet) + Send + Sync>;

/// Computer-controlled seat.
pub struct SyntheticParticipant {
    id: ParticipantId,
    resolver: Resolver,
}

impl fmt::Debug for SyntheticParticipant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticParticipant")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SyntheticParticipant {
    pub fn new(
        id: impl Into<ParticipantId>,
        resolver: impl Fn(&Transaction, &mut dyn Inputlet) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            resolver: Arc::new(resolver),
        }
    }
}

impl Participant for SyntheticParticipant {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    fn presence(&self) -> Presence {
        Presence::InGame
    }

    fn is_synthetic(&self) -> bool {
        true
    }

    fn answer<'a>(&'a self, request: AnswerRequest<'a>) -> AnswerFut<'a> {
        (self.resolver)(request.transaction, &mut *request.prompt);
        Box::pin(ready(Ok(request.prompt.data())))
    }

    fn deliver(&self, _tag: &str, _payload: &Value) -> Result<(), TransportError> {
        Ok(())
    }
}
