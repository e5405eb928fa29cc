//! LocalHost - プロセス内のホスト中継（Bridge トランスポートの開発用実装）
//!
//! # 振る舞い
//! - 受け取ったメッセージに全体で単調増加の serial を振る
//! - 送信者自身を含む全リスナーへ配る（エコー抑制は受信側の責務）
//! - 履歴を保持し、`since_serial` より新しいものを再登録時に返す

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::TransportError;
use crate::ports::{BridgeMessage, BridgePayload, HostChannel, UpdateSubscription};

#[derive(Debug, Default)]
struct RelayState {
    serial: u64,
    history: Vec<BridgeMessage>,
    listeners: Vec<mpsc::UnboundedSender<BridgeMessage>>,
}

/// The relay. Hand one [`LocalHostEndpoint`] to each replica.
#[derive(Debug, Clone, Default)]
pub struct LocalHost {
    state: Arc<Mutex<RelayState>>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self, addr: impl Into<String>) -> LocalHostEndpoint {
        LocalHostEndpoint {
            relay: self.clone(),
            addr: addr.into(),
        }
    }

    /// Serial of the last relayed message.
    pub fn last_serial(&self) -> u64 {
        self.lock().serial
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub struct LocalHostEndpoint {
    relay: LocalHost,
    addr: String,
}

#[async_trait]
impl HostChannel for LocalHostEndpoint {
    fn self_addr(&self) -> String {
        self.addr.clone()
    }

    async fn set_update_listener(
        &self,
        since_serial: u64,
    ) -> Result<UpdateSubscription, TransportError> {
        let mut state = self.relay.lock();
        let backlog = state
            .history
            .iter()
            .filter(|message| message.serial > since_serial)
            .cloned()
            .collect();
        let (tx, live) = mpsc::unbounded_channel();
        state.listeners.push(tx);
        Ok(UpdateSubscription { backlog, live })
    }

    async fn send_update(
        &self,
        payload: BridgePayload,
        _description: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.relay.lock();
        state.serial += 1;
        let message = BridgeMessage {
            payload,
            serial: state.serial,
        };
        state.history.push(message.clone());
        state
            .listeners
            .retain(|listener| listener.send(message.clone()).is_ok());
        Ok(())
    }
}
