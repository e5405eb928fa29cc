//! The shared, async handle to the process's document.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use super::document::{Document, Transaction};
use super::op::{ActorId, Update};
use crate::app::persistence::PersistenceBinding;
use crate::domain::{CodecError, StoreError};

/// Where a change came from. Anything but `Local` is the remote-origin marker
/// that keeps transports from echoing updates back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Persistence,
    Bridge,
    Mesh,
}

impl Origin {
    pub fn is_local(self) -> bool {
        self == Origin::Local
    }
}

/// An encoded update as seen by subscribers.
#[derive(Debug, Clone)]
pub struct DocUpdate {
    pub bytes: Arc<[u8]>,
    pub origin: Origin,
}

pub struct Replica {
    doc: Mutex<Document>,
    persistence: Option<Arc<PersistenceBinding>>,
    subscribers: StdMutex<Vec<mpsc::UnboundedSender<DocUpdate>>>,
}

impl Replica {
    /// A replica that is not persisted.
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Mutex::new(doc),
            persistence: None,
            subscribers: StdMutex::new(Vec::new()),
        }
    }

    pub fn with_persistence(doc: Document, persistence: Arc<PersistenceBinding>) -> Self {
        Self {
            persistence: Some(persistence),
            ..Self::new(doc)
        }
    }

    pub async fn actor(&self) -> ActorId {
        self.doc.lock().await.actor()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let doc = self.doc.lock().await;
        f(&doc)
    }

    /// Run `f` as one transaction. Its ops are saved and then published as one update.
    ///
    /// Ops are kept even when `f` returns an error value: they are already part of
    /// the local state, so they are persisted like any other.
    pub async fn transact<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> R,
    ) -> Result<R, StoreError> {
        let (result, update) = {
            let mut doc = self.doc.lock().await;
            let mut txn = doc.transact();
            let result = f(&mut txn);
            (result, txn.commit())
        };
        if let Some(update) = update {
            debug!(ops = update.ops.len(), "committed local transaction");
            self.publish(update, Origin::Local).await?;
        }
        Ok(result)
    }

    /// Merge an encoded update. Returns `false` when it held nothing new.
    pub async fn apply_update(&self, bytes: &[u8], origin: Origin) -> Result<bool, StoreError> {
        let update = Update::decode(bytes)?;
        self.merge(update, origin).await
    }

    pub(crate) async fn merge(&self, update: Update, origin: Origin) -> Result<bool, StoreError> {
        let fresh = self.doc.lock().await.apply_update(update);
        if fresh.is_empty() {
            return Ok(false);
        }
        debug!(?origin, ops = fresh.ops.len(), "merged update");
        self.publish(fresh, origin).await?;
        Ok(true)
    }

    /// Full state as one encoded update.
    pub async fn encode_state(&self) -> Result<Vec<u8>, CodecError> {
        self.doc.lock().await.encode_state().encode()
    }

    /// Every update from now on, in publication order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DocUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn document(&self) -> &Mutex<Document> {
        &self.doc
    }

    async fn publish(&self, update: Update, origin: Origin) -> Result<(), StoreError> {
        let bytes: Arc<[u8]> = update.encode()?.into();
        if origin != Origin::Persistence
            && let Some(persistence) = &self.persistence
        {
            persistence.save(&bytes, self).await?;
        }
        let message = DocUpdate { bytes, origin };
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }
}
