//! Bridge transport: update exchange through the host's message relay.
//!
//! The host numbers messages with `serial`; the loop keeps the highest serial it has
//! applied (`last_serial`, in memory, 0 at process start) and re-registers from there
//! when the live stream ends. Only `Local` updates go out, so merged remote updates
//! are never echoed.
//!
//! After a failed send the next send carries the full state. It goes out with the
//! next local update, or after `resend_interval` when none comes. The flag is not
//! persisted: a process that stops before the resend leaves the delta to the
//! next full-state exchange with that peer.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::tasks::{SyncTasks, stopped};
use super::{AttachPolicy, TransportKind, TransportStatus};
use crate::domain::TransportError;
use crate::ports::{BridgeMessage, BridgePayload, HostChannel};
use crate::replica::{DocUpdate, Origin, Replica};

const UPDATE_DESCRIPTION: &str = "tasknest update";

struct BridgeLink {
    host: Arc<dyn HostChannel>,
    replica: Arc<Replica>,
    policy: AttachPolicy,
    sender: String,
    last_serial: u64,
    /// A send failed; the next send carries the full state instead of a delta.
    resend_state: bool,
}

pub(super) async fn attach(
    host: Arc<dyn HostChannel>,
    replica: Arc<Replica>,
    policy: AttachPolicy,
    status: Arc<watch::Sender<TransportStatus>>,
    tasks: &mut SyncTasks,
) -> Result<(), TransportError> {
    let local = replica.subscribe();
    let mut link = BridgeLink {
        sender: host.self_addr(),
        host,
        replica,
        policy,
        last_serial: 0,
        resend_state: false,
    };
    let live = link.subscribe().await?;
    info!(sender = %link.sender, last_serial = link.last_serial, "bridge transport attached");

    status.send_replace(TransportStatus::Attached(TransportKind::Bridge));
    tasks.spawn(move |shutdown| link.run(live, local, shutdown, status));
    Ok(())
}

impl BridgeLink {
    /// Register from `last_serial` and apply the backlog before returning.
    async fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<BridgeMessage>, TransportError> {
        let host = &self.host;
        let since = self.last_serial;
        let subscription = self
            .policy
            .run("set_update_listener", move || host.set_update_listener(since))
            .await?;
        for message in subscription.backlog {
            self.receive(message).await;
        }
        Ok(subscription.live)
    }

    async fn run(
        mut self,
        mut live: mpsc::UnboundedReceiver<BridgeMessage>,
        mut local: mpsc::UnboundedReceiver<DocUpdate>,
        mut shutdown: watch::Receiver<bool>,
        status: Arc<watch::Sender<TransportStatus>>,
    ) {
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                message = live.recv() => match message {
                    Some(message) => self.receive(message).await,
                    None => {
                        warn!(last_serial = self.last_serial, "bridge listener closed, re-registering");
                        match self.subscribe().await {
                            Ok(next) => live = next,
                            Err(e) => {
                                warn!(error = %e, "bridge transport lost");
                                status.send_replace(TransportStatus::Failed {
                                    kind: TransportKind::Bridge,
                                    reason: e.to_string(),
                                });
                                break;
                            }
                        }
                    }
                },
                update = local.recv() => match update {
                    Some(update) if update.origin.is_local() => self.forward(update).await,
                    Some(_) => {}
                    None => break,
                },
                _ = tokio::time::sleep(self.policy.resend_interval), if self.resend_state => {
                    debug!("resending full state to the bridge");
                    self.send_state().await;
                }
            }
        }
        debug!("bridge loop stopped");
    }

    async fn receive(&mut self, message: BridgeMessage) {
        self.last_serial = self.last_serial.max(message.serial);
        match self
            .replica
            .apply_update(&message.payload.update, Origin::Bridge)
            .await
        {
            Ok(true) => debug!(serial = message.serial, from = %message.payload.sender, "applied bridge update"),
            Ok(false) => {}
            Err(e) => warn!(serial = message.serial, error = %e, "dropping bridge update"),
        }
    }

    async fn forward(&mut self, update: DocUpdate) {
        if self.resend_state {
            self.send_state().await;
        } else {
            self.send(update.bytes.to_vec()).await;
        }
    }

    async fn send_state(&mut self) {
        match self.replica.encode_state().await {
            Ok(state) => self.send(state).await,
            Err(e) => warn!(error = %e, "cannot encode state for the bridge"),
        }
    }

    async fn send(&mut self, bytes: Vec<u8>) {
        let payload = BridgePayload {
            update: bytes,
            sender: self.sender.clone(),
        };

        let host = &self.host;
        let sent = self
            .policy
            .run("send_update", move || {
                host.send_update(payload.clone(), UPDATE_DESCRIPTION)
            })
            .await;
        match sent {
            Ok(()) => self.resend_state = false,
            Err(e) => {
                warn!(error = %e, "bridge send failed, next send carries full state");
                self.resend_state = true;
            }
        }
    }
}
