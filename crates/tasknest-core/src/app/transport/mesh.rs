//! Mesh transport: peers in a password-protected room exchange updates directly.
//!
//! On join a peer broadcasts its full state and asks the others for theirs;
//! a `SyncRequest` is answered with the full state. After that only `Local`
//! updates are broadcast.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::tasks::{SyncTasks, stopped};
use super::{AttachPolicy, TransportKind, TransportStatus};
use crate::domain::{CodecError, TransportError};
use crate::ports::{MeshLink, MeshNetwork};
use crate::replica::{DocUpdate, Origin, Replica};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshMessage {
    SyncRequest,
    Update(Vec<u8>),
}

impl MeshMessage {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

struct MeshPeer {
    replica: Arc<Replica>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    room: String,
}

pub(super) async fn attach(
    network: Arc<dyn MeshNetwork>,
    room: String,
    password: String,
    replica: Arc<Replica>,
    policy: AttachPolicy,
    status: Arc<watch::Sender<TransportStatus>>,
    tasks: &mut SyncTasks,
) -> Result<(), TransportError> {
    let (room_ref, password_ref) = (room.as_str(), password.as_str());
    let network_ref = &network;
    let MeshLink { outbound, inbound } = policy
        .run("join", move || network_ref.join(room_ref, password_ref))
        .await?;

    let local = replica.subscribe();
    let peer = MeshPeer {
        replica,
        outbound,
        room,
    };
    peer.send_state().await?;
    peer.send(&MeshMessage::SyncRequest)?;
    info!(room = %peer.room, "mesh transport attached");

    status.send_replace(TransportStatus::Attached(TransportKind::Mesh));
    tasks.spawn(move |shutdown| peer.run(inbound, local, shutdown, status));
    Ok(())
}

impl MeshPeer {
    fn send(&self, message: &MeshMessage) -> Result<(), TransportError> {
        self.outbound
            .send(message.encode()?)
            .map_err(|_| TransportError::Closed)
    }

    async fn send_state(&self) -> Result<(), TransportError> {
        let state = self.replica.encode_state().await?;
        self.send(&MeshMessage::Update(state))
    }

    async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
        mut local: mpsc::UnboundedReceiver<DocUpdate>,
        mut shutdown: watch::Receiver<bool>,
        status: Arc<watch::Sender<TransportStatus>>,
    ) {
        loop {
            let result = tokio::select! {
                _ = stopped(&mut shutdown) => break,
                message = inbound.recv() => match message {
                    Some(bytes) => self.receive(&bytes).await,
                    None => Err(TransportError::Closed),
                },
                update = local.recv() => match update {
                    Some(update) if update.origin.is_local() => {
                        self.send(&MeshMessage::Update(update.bytes.to_vec()))
                    }
                    Some(_) => Ok(()),
                    None => break,
                },
            };
            if let Err(e) = result {
                warn!(room = %self.room, error = %e, "mesh transport lost");
                status.send_replace(TransportStatus::Failed {
                    kind: TransportKind::Mesh,
                    reason: e.to_string(),
                });
                break;
            }
        }
        debug!(room = %self.room, "mesh loop stopped");
    }

    /// Undecodable or unmergeable messages are dropped; only a closed link is an error.
    async fn receive(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let message = match MeshMessage::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(room = %self.room, error = %e, "dropping mesh message");
                return Ok(());
            }
        };
        match message {
            MeshMessage::SyncRequest => self.send_state().await,
            MeshMessage::Update(update) => {
                match self.replica.apply_update(&update, Origin::Mesh).await {
                    Ok(fresh) => debug!(room = %self.room, fresh, "applied mesh update"),
                    Err(e) => warn!(room = %self.room, error = %e, "dropping mesh update"),
                }
                Ok(())
            }
        }
    }
}
