//! tasknest-core
//!
//! Local-first replicated store for tasks and kanban buckets.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, bucket, user, position, query, outcome, errors）
//! - **replica**: 複製文書（op, list CRDT, document, shared replica handle）
//! - **ports**: 抽象化レイヤー（StateStore, HostChannel, MeshNetwork, SettingsStore, IdGenerator）
//! - **impls**: 実装（メモリ/ファイルのストア、プロセス内ホスト・メッシュ、設定）
//! - **app**: アプリケーションロジック（session, persistence, transport, repositories）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod replica;
