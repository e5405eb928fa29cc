//! App - アプリケーション層
//!
//! このモジュールは、ports と replica を組み合わせてストアの操作を実装します。
//!
//! # 主要コンポーネント
//! - **DocumentSession**: 文書セッションの遅延・単一初期化（ensure_session）
//! - **PersistenceBinding**: 更新の永続化、起動時の再読込、ログの圧縮
//! - **Transport**: ホスト中継（bridge）またはピアメッシュ（mesh）への接続
//! - **TaskRepository / BucketRepository**: タスクとバケットの CRUD
//! - **RetryPolicy**: ストレージとトランスポート境界のタイムアウトと再試行

pub mod bucket_repo;
pub mod config;
pub mod persistence;
pub(crate) mod records;
pub mod retry;
pub mod session;
pub mod task_repo;
pub mod transport;

// 主要な型を再エクスポート
pub use self::bucket_repo::BucketRepository;
pub use self::config::{PersistenceConfig, RetryConfig, StoreConfig, TransportConfig};
pub use self::persistence::PersistenceBinding;
pub use self::retry::{RetryPolicy, Retryable};
pub use self::session::{BuildError, DocumentSession, Session, SessionBuilder};
pub use self::task_repo::TaskRepository;
pub use self::transport::{Environment, Transport, TransportKind, TransportStatus};
