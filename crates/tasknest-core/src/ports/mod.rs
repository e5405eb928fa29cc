//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部環境（ストレージ、ホストのメッセージ中継、ピアメッシュ、
//! ローカル設定）へのインターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 永続化（StateStore）が耐久性の正本
//! - トランスポート（HostChannel / MeshNetwork）はベストエフォート
//! - どの環境機能が使えるかはセッション構築時に一度だけ判定する

pub mod host_channel;
pub mod id_generator;
pub mod mesh;
pub mod settings;
pub mod state_store;

// 主要な trait を再エクスポート
pub use self::host_channel::{BridgeMessage, BridgePayload, HostChannel, UpdateSubscription};
pub use self::id_generator::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use self::mesh::{MeshLink, MeshNetwork};
pub use self::settings::{SettingsStore, SharingSettings};
pub use self::state_store::StateStore;
