//! MemoryStateStore - テスト用のインメモリ永続化
//!
//! # 学習ポイント
//! - Clone で内部状態を共有（Arc）し、「再起動」を同じストアで再現する
//! - 障害注入（load / append の失敗、load の遅延）
//! - load 呼び出し回数を数えて single-flight 初期化を検証する

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::PersistenceError;
use crate::ports::StateStore;

#[derive(Debug, Default)]
struct Inner {
    logs: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    fail_loads: AtomicBool,
    fail_writes: AtomicBool,
    load_calls: AtomicUsize,
    load_delay: Mutex<Option<Duration>>,
}

/// Clones share the same logs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Inner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_loads(&self, fail: bool) {
        self.inner.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every `load` sleep first, so concurrent callers overlap.
    pub fn set_load_delay(&self, delay: Duration) {
        *self.inner.load_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    pub fn load_calls(&self) -> usize {
        self.inner.load_calls.load(Ordering::SeqCst)
    }

    pub fn records(&self, namespace: &str) -> Vec<Vec<u8>> {
        self.logs().get(namespace).cloned().unwrap_or_default()
    }

    fn logs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Vec<u8>>>> {
        self.inner.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writes(&self) -> Result<(), PersistenceError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, namespace: &str) -> Result<Vec<Vec<u8>>, PersistenceError> {
        self.inner.load_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self
            .inner
            .load_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("loads disabled".into()));
        }
        Ok(self.records(namespace))
    }

    async fn append(&self, namespace: &str, record: &[u8]) -> Result<(), PersistenceError> {
        self.check_writes()?;
        self.logs()
            .entry(namespace.to_string())
            .or_default()
            .push(record.to_vec());
        Ok(())
    }

    async fn replace(&self, namespace: &str, snapshot: &[u8]) -> Result<(), PersistenceError> {
        self.check_writes()?;
        self.logs()
            .insert(namespace.to_string(), vec![snapshot.to_vec()]);
        Ok(())
    }
}
