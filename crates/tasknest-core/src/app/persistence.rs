//! Persistence binding: loads the document before it is used and saves every change.
//!
//! The log under the namespace is the source of truth for durability. Every store call
//! runs under a timeout and the retry policy; a failed load fails session start.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::config::StoreConfig;
use super::retry::RetryPolicy;
use crate::domain::{PersistenceError, StoreError};
use crate::ports::StateStore;
use crate::replica::{Origin, Replica, Update};

pub struct PersistenceBinding {
    store: Arc<dyn StateStore>,
    namespace: String,
    retry: RetryPolicy,
    op_timeout: Duration,
    compact_after: usize,
    /// Records in the log since the last snapshot. Held across each write, so writes
    /// and compactions never interleave.
    records: Mutex<usize>,
}

impl PersistenceBinding {
    pub fn new(store: Arc<dyn StateStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            namespace: config.namespace.clone(),
            retry: RetryPolicy::from_config(&config.persistence.retry),
            op_timeout: config.persistence.op_timeout(),
            compact_after: config.persistence.compact_after_updates,
            records: Mutex::new(0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Apply every stored record to `replica`. Returns the number of records read.
    pub async fn load(&self, replica: &Replica) -> Result<usize, StoreError> {
        let store = &self.store;
        let namespace = self.namespace.as_str();
        let stored = self
            .retry
            .run("load", self.op_timeout, move || store.load(namespace))
            .await?;

        for (index, record) in stored.iter().enumerate() {
            let update = Update::decode(record)
                .map_err(|e| PersistenceError::Corrupt(format!("record {index}: {e}")))?;
            replica.merge(update, Origin::Persistence).await?;
        }

        let ops = replica.read(|doc| doc.op_count()).await;
        info!(namespace, records = stored.len(), ops, "document loaded");

        let mut records = self.records.lock().await;
        *records = stored.len();
        if self.should_compact(*records) {
            *records = self.compact(replica).await?;
        }
        Ok(stored.len())
    }

    /// Append one encoded update, compacting the log once it grows past the threshold.
    pub(crate) async fn save(&self, record: &[u8], replica: &Replica) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let store = &self.store;
        let namespace = self.namespace.as_str();
        self.retry
            .run("append", self.op_timeout, move || store.append(namespace, record))
            .await?;
        *records += 1;
        if self.should_compact(*records) {
            *records = self.compact(replica).await?;
        }
        Ok(())
    }

    fn should_compact(&self, records: usize) -> bool {
        self.compact_after > 0 && records >= self.compact_after
    }

    /// The snapshot includes every op applied so far, so updates that are saved after
    /// it only duplicate ops, which replay ignores.
    async fn compact(&self, replica: &Replica) -> Result<usize, StoreError> {
        let snapshot = replica.document().lock().await.encode_state().encode()?;
        let store = &self.store;
        let namespace = self.namespace.as_str();
        let bytes = snapshot.as_slice();
        self.retry
            .run("replace", self.op_timeout, move || store.replace(namespace, bytes))
            .await?;
        debug!(namespace, bytes = snapshot.len(), "compacted update log");
        Ok(1)
    }
}
