//! Domain identifiers (strongly-typed IDs).
//!
//! レコード ID は数値（i64）です。ID はプロセスローカルに生成され、レプリカ間で
//! 調整されません（衝突しにくいランダム値を使う）。
//!
//! ## Phantom Type パターン
//! `Id<T>` というジェネリック型で共通実装を提供しつつ、
//! `T` は実行時には使わない（PhantomData）マーカー型として、
//! コンパイル時の型安全性を提供します。
//!
//! ## 「未設定」の扱い
//! 0 以下の ID は「未設定」を意味します（例: bucketId が 0 のタスクは
//! プロジェクトのデフォルトバケットに入る）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "bucket-", "project-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// シリアライズ形式は素の数値です（`{"bucketId": 3}`）。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: i64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const fn new(value: i64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// The "absent" id (0).
    pub const fn unset() -> Self {
        Self::new(0)
    }

    pub fn get(&self) -> i64 {
        self.value
    }

    /// `true` for ids that do not reference a record (zero or negative).
    pub fn is_unset(&self) -> bool {
        self.value <= 0
    }
}

impl<T: IdMarker> Default for Id<T> {
    fn default() -> Self {
        Self::unset()
    }
}

impl<T: IdMarker> From<i64> for Id<T> {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {}

impl IdMarker for Bucket {
    fn prefix() -> &'static str {
        "bucket-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Project {}

impl IdMarker for Project {
    fn prefix() -> &'static str {
        "project-"
    }
}

/// Identifier of a task record.
pub type TaskId = Id<Task>;

/// Identifier of a kanban bucket.
pub type BucketId = Id<Bucket>;

/// Identifier of a project. Projects themselves are not stored here.
pub type ProjectId = Id<Project>;
