//! Input transactions.
//!
//! A transaction brackets one logical multi-participant prompt. Hooks see a
//! begin event when a [`TransactionScope`] opens and an end event when it is
//! dropped, whichever way the scope is left.

use std::fmt;
use std::sync::Arc;

use arbiter_types::ParticipantId;

use crate::hooks::{EventHooks, GameEvent};

struct TransactionInner {
    name: String,
    participants: Vec<ParticipantId>,
}

/// Cheap, cloneable handle to one transaction.
#[derive(Clone)]
pub struct Transaction(Arc<TransactionInner>);

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.0.name)
            .field("participants", &self.0.participants)
            .finish()
    }
}

impl Transaction {
    /// A transaction that no scope observes. Mostly useful in tests.
    pub fn detached(name: impl Into<String>, participants: Vec<ParticipantId>) -> Self {
        Self(Arc::new(TransactionInner {
            name: name.into(),
            participants,
        }))
    }

    /// Tag namespace, usually the prompt type tag.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Participants in request order.
    #[must_use]
    pub fn participants(&self) -> &[ParticipantId] {
        &self.0.participants
    }

    #[must_use]
    pub fn same_as(&self, other: &Transaction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Open transaction. Dropping it closes the transaction.
pub struct TransactionScope {
    transaction: Transaction,
    hooks: Arc<dyn EventHooks>,
}

impl TransactionScope {
    pub(crate) fn begin(
        hooks: Arc<dyn EventHooks>,
        name: impl Into<String>,
        participants: Vec<ParticipantId>,
    ) -> Self {
        let transaction = Transaction::detached(name, participants);
        hooks.emit(&GameEvent::TransactionBegin {
            transaction: &transaction,
        });
        Self { transaction, hooks }
    }

    #[must_use]
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.hooks.emit(&GameEvent::TransactionEnd {
            transaction: &self.transaction,
        });
    }
}
