//! Errors - エラー型と分類
//!
//! # 分類
//! - **StoreError**: データ整合性に関わるエラー（呼び出し元へ伝播する）
//! - **PersistenceError**: 永続化層の失敗（セッション初期化では致命的）
//! - **TransportError**: 同期トランスポートの失敗（ログのみ、呼び出し元には出さない）
//! - **CodecError**: 更新データのエンコード／デコード失敗
//!
//! NotFound や「最後のバケットは削除できない」といったドメイン規則違反は
//! エラーではなく [`Outcome`](super::outcome::Outcome) で表現します。

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("update codec: {0}")]
    Codec(#[from] CodecError),

    #[error("malformed record in document: {0}")]
    Record(#[from] serde_json::Error),

    /// JSON has no encoding for NaN or infinity; such a record could never be read back.
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage {op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("stored state is corrupt: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("access to room {room} denied")]
    AccessDenied { room: String },

    #[error("transport channel closed")]
    Closed,

    #[error("transport attach timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}
