//! MeshNetwork port - パスワード保護されたルームによるピア間同期（Mesh トランスポート）
//!
//! ルームに参加すると、そのルームへのブロードキャスト用送信口と、
//! 他ピアからのメッセージの受信口が得られます。メッセージの中身は不透明なバイト列です。

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::TransportError;

/// A joined room. Dropping `outbound` leaves the room.
#[derive(Debug)]
pub struct MeshLink {
    pub outbound: mpsc::UnboundedSender<Vec<u8>>,
    pub inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
pub trait MeshNetwork: Send + Sync {
    /// Join `room`. A wrong password is `TransportError::AccessDenied`.
    async fn join(&self, room: &str, password: &str) -> Result<MeshLink, TransportError>;
}
