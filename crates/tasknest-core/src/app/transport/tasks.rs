use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background sync loops of one transport.
/// - `request_shutdown()` で全ループに停止を通知する
/// - `shutdown_and_join()` で全ループの終了を待てる
pub struct SyncTasks {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl SyncTasks {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            joins: Vec::new(),
        }
    }

    /// Spawn a loop. It gets a receiver that flips to `true` on shutdown.
    pub fn spawn<F, Fut>(&mut self, f: F)
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let join = tokio::spawn(f(self.shutdown_tx.subscribe()));
        self.joins.push(join);
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Loops finish the message they are handling, then stop.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

impl Default for SyncTasks {
    fn default() -> Self {
        Self::new()
    }
}

/// `true` once shutdown was requested or the group is gone.
pub(super) async fn stopped(shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    shutdown.changed().await.is_err() || *shutdown.borrow()
}
