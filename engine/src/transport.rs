//! Transport contract and an in-memory channel transport.
//!
//! The engine only needs two things from a connection: a non-blocking tagged
//! write, and a way to wait for the inbound frame carrying a given tag. Framing
//! and sockets live outside this crate.
//!
//! [`ChannelTransport`] is the in-process implementation: the server half
//! implements [`Transport`], the [`ClientEnd`] half plays the remote client.
//! Responses are routed to waiters by tag through a pending map of oneshot
//! senders; a response nobody is waiting for is dropped. Dropping the client
//! half fails every pending waiter with [`TransportError::ConnectionLost`].

use std::collections::HashMap;
use std::fmt;
use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;

/// Future returned by [`Transport::await_tagged`].
pub type TransportFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// One tagged frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tag: String,
    pub payload: Value,
}

pub trait Transport: Send + Sync + fmt::Debug {
    /// Queue a tagged write. Never blocks.
    fn send(&self, tag: &str, payload: &Value) -> Result<(), TransportError>;

    /// Wait for the inbound frame carrying exactly `tag`.
    ///
    /// The wait is registered when this is called, not when the future is
    /// first polled, so call it before sending the request. Resolves to
    /// [`TransportError::ConnectionLost`] if the connection dies first.
    /// Dropping the future abandons the wait.
    fn await_tagged<'a>(&'a self, tag: &'a str) -> TransportFut<'a, Frame>;

    fn is_connected(&self) -> bool;
}

#[derive(Default)]
struct Inbox {
    connected: bool,
    /// Waiters registered for a tag that has not arrived yet.
    pending: HashMap<String, oneshot::Sender<Value>>,
}

type SharedInbox = Arc<Mutex<Inbox>>;

fn lock(inbox: &Mutex<Inbox>) -> MutexGuard<'_, Inbox> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Server half of an in-memory connection.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Frame>,
    inbox: SharedInbox,
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inbox = lock(&self.inbox);
        f.debug_struct("ChannelTransport")
            .field("connected", &inbox.connected)
            .field("pending", &inbox.pending.len())
            .finish()
    }
}

impl ChannelTransport {
    /// Create a connected server/client pair.
    #[must_use]
    pub fn pair() -> (Arc<Self>, ClientEnd) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let inbox = Arc::new(Mutex::new(Inbox {
            connected: true,
            ..Inbox::default()
        }));
        let transport = Arc::new(Self {
            outbound,
            inbox: Arc::clone(&inbox),
        });
        let client = ClientEnd {
            inbound: outbound_rx,
            inbox,
        };
        (transport, client)
    }
}

/// Removes a pending registration if the wait is abandoned before it resolves.
struct PendingGuard {
    inbox: SharedInbox,
    tag: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.inbox).pending.remove(&self.tag);
    }
}

impl Transport for ChannelTransport {
    fn send(&self, tag: &str, payload: &Value) -> Result<(), TransportError> {
        self.outbound
            .send(Frame {
                tag: tag.to_string(),
                payload: payload.clone(),
            })
            .map_err(|_| TransportError::Closed)
    }

    fn await_tagged<'a>(&'a self, tag: &'a str) -> TransportFut<'a, Frame> {
        let rx = {
            let mut inbox = lock(&self.inbox);
            if !inbox.connected {
                return Box::pin(ready(Err(TransportError::ConnectionLost)));
            }
            let (tx, rx) = oneshot::channel();
            inbox.pending.insert(tag.to_string(), tx);
            rx
        };
        let guard = PendingGuard {
            inbox: Arc::clone(&self.inbox),
            tag: tag.to_string(),
        };

        Box::pin(async move {
            let _guard = guard;
            match rx.await {
                Ok(payload) => Ok(Frame {
                    tag: tag.to_string(),
                    payload,
                }),
                Err(_) => Err(TransportError::ConnectionLost),
            }
        })
    }

    fn is_connected(&self) -> bool {
        lock(&self.inbox).connected
    }
}

/// Client half of an in-memory connection.
///
/// Dropping it is a disconnect.
pub struct ClientEnd {
    inbound: mpsc::UnboundedReceiver<Frame>,
    inbox: SharedInbox,
}

impl fmt::Debug for ClientEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientEnd").finish_non_exhaustive()
    }
}

impl ClientEnd {
    /// Next frame written by the server. `None` once the server half is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inbound.try_recv().ok()
    }

    /// Deliver a tagged frame to the server.
    ///
    /// Routed to the waiter for `tag`. Without one (unknown tag, or a wait
    /// that was abandoned) the frame is dropped.
    pub fn respond(&self, tag: &str, payload: Value) -> Result<(), TransportError> {
        let mut inbox = lock(&self.inbox);
        if !inbox.connected {
            return Err(TransportError::Closed);
        }
        match inbox.pending.remove(tag) {
            Some(tx) => {
                let _ = tx.send(payload);
            }
            None => tracing::debug!(tag, "Dropping response nobody is waiting for"),
        }
        Ok(())
    }

    pub fn disconnect(self) {}
}

impl Drop for ClientEnd {
    fn drop(&mut self) {
        let mut inbox = lock(&self.inbox);
        inbox.connected = false;
        // Dropping the senders resolves every pending waiter with ConnectionLost.
        inbox.pending.clear();
    }
}
