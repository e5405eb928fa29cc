//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **MemoryStateStore / FileStateStore**: StateStore
//! - **LocalHost**: プロセス内のホスト中継（HostChannel）
//! - **LocalMesh**: プロセス内のピアメッシュ（MeshNetwork）
//! - **MemorySettings / FileSettings**: SettingsStore
//!
//! 実環境のホストチャネルやメッシュ（WebRTC など）は同じ trait を実装する別クレートに置きます。

pub mod file_store;
pub mod local_host;
pub mod local_mesh;
pub mod memory_store;
pub mod settings;

// 主要な型を再エクスポート
pub use self::file_store::FileStateStore;
pub use self::local_host::{LocalHost, LocalHostEndpoint};
pub use self::local_mesh::LocalMesh;
pub use self::memory_store::MemoryStateStore;
pub use self::settings::{FileSettings, MemorySettings};
