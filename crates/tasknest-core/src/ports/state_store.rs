//! StateStore port - ドキュメント状態の永続化
//!
//! 永続化されるのはエンコード済みの更新（レコード）の列です。
//! レコードを順に適用するとドキュメントが復元されます。
//!
//! # 実装
//! - **MemoryStateStore**: テスト用（障害注入あり）
//! - **FileStateStore**: データディレクトリ内のログファイル

use async_trait::async_trait;

use crate::domain::PersistenceError;

/// StateStore は namespace ごとに更新レコードのログを保持する
///
/// # 契約
/// - `load` は `append` された順にレコードを返す
/// - `replace` はログ全体を 1 つのスナップショットで置き換える（原子的に）
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, namespace: &str) -> Result<Vec<Vec<u8>>, PersistenceError>;

    async fn append(&self, namespace: &str, record: &[u8]) -> Result<(), PersistenceError>;

    async fn replace(&self, namespace: &str, snapshot: &[u8]) -> Result<(), PersistenceError>;
}
