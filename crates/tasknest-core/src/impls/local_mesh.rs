//! LocalMesh - プロセス内のピアメッシュ（Mesh トランスポートの開発用実装）
//!
//! # 振る舞い
//! - ルームは最初の参加者のパスワードで作られる
//! - 異なるパスワードでの参加は AccessDenied
//! - ブロードキャストは送信者以外の全ピアへ届く
//! - ピアごとにルータータスクを 1 つ持ち、送信口が閉じたらルームから抜ける

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::TransportError;
use crate::ports::{MeshLink, MeshNetwork};

type PeerId = u64;

#[derive(Debug)]
struct Room {
    password: String,
    peers: Vec<(PeerId, mpsc::UnboundedSender<Vec<u8>>)>,
}

#[derive(Debug, Default)]
struct MeshState {
    next_peer: PeerId,
    rooms: HashMap<String, Room>,
}

#[derive(Debug, Clone, Default)]
pub struct LocalMesh {
    state: Arc<Mutex<MeshState>>,
}

impl LocalMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_count(&self, room: &str) -> usize {
        self.lock().rooms.get(room).map_or(0, |r| r.peers.len())
    }

    fn lock(&self) -> MutexGuard<'_, MeshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, room: &str, from: PeerId, message: &[u8]) {
        let mut state = self.lock();
        if let Some(room) = state.rooms.get_mut(room) {
            room.peers
                .retain(|(id, tx)| *id == from || tx.send(message.to_vec()).is_ok());
        }
    }

    fn leave(&self, room_name: &str, peer: PeerId) {
        let mut state = self.lock();
        if let Some(room) = state.rooms.get_mut(room_name) {
            room.peers.retain(|(id, _)| *id != peer);
            if room.peers.is_empty() {
                state.rooms.remove(room_name);
            }
        }
        debug!(room = room_name, peer, "peer left room");
    }
}

#[async_trait]
impl MeshNetwork for LocalMesh {
    async fn join(&self, room: &str, password: &str) -> Result<MeshLink, TransportError> {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let peer = {
            let mut state = self.lock();
            state.next_peer += 1;
            let peer = state.next_peer;
            let entry = state.rooms.entry(room.to_string()).or_insert_with(|| Room {
                password: password.to_string(),
                peers: Vec::new(),
            });
            if entry.password != password {
                return Err(TransportError::AccessDenied {
                    room: room.to_string(),
                });
            }
            entry.peers.push((peer, inbound_tx));
            peer
        };

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mesh = self.clone();
        let room = room.to_string();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                mesh.broadcast(&room, peer, &message);
            }
            mesh.leave(&room, peer);
        });

        Ok(MeshLink { outbound, inbound })
    }
}
