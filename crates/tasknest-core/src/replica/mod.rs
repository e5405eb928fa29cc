//! Replica - 複製ドキュメント
//!
//! (actor-id, Lamport カウンタ) をキーとする操作ログで、順序付きリストと
//! LWW マップを表現します。マージは可換・結合的・冪等です。
//!
//! # 構成
//! - **op**: OpId / Op / Update（CBOR エンコード）
//! - **list**: RGA による順序付きリスト
//! - **document**: リストとマップを束ねたドキュメントとトランザクション
//! - **shared**: 非同期で共有されるハンドル（永続化と購読者への通知）

pub mod document;
pub(crate) mod list;
pub mod op;
pub mod shared;

pub use self::document::{Document, Transaction};
pub use self::op::{ActorId, Op, OpId, Update};
pub use self::shared::{DocUpdate, Origin, Replica};
