//! HostChannel port - ホスト環境が提供する更新交換チャネル（Bridge トランスポート）
//!
//! ホスト（ネイティブシェルなど）は受け取ったメッセージに単調増加の `serial` を振って
//! 全リスナーへ配ります。`serial` はリスナー再登録時の再開カーソルとしてのみ使い、
//! ピア間の順序付けには使いません。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgePayload {
    /// Encoded document update, opaque to the host.
    pub update: Vec<u8>,
    /// Identity of the sending replica. Carried, not used for echo suppression.
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub payload: BridgePayload,
    pub serial: u64,
}

/// Messages the host had already numbered past the resume cursor, and the live stream.
#[derive(Debug)]
pub struct UpdateSubscription {
    pub backlog: Vec<BridgeMessage>,
    pub live: mpsc::UnboundedReceiver<BridgeMessage>,
}

#[async_trait]
pub trait HostChannel: Send + Sync {
    /// Local identity, sent as `BridgePayload::sender`.
    fn self_addr(&self) -> String;

    /// Register the update listener, replaying messages with `serial > since_serial`.
    async fn set_update_listener(&self, since_serial: u64)
    -> Result<UpdateSubscription, TransportError>;

    async fn send_update(
        &self,
        payload: BridgePayload,
        description: &str,
    ) -> Result<(), TransportError>;
}
