//! IdGenerator port - ID 生成の抽象化
//!
//! レコード ID はプロセスローカルに生成され、レプリカ間で調整されません。
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **RandomIdGenerator**: 広い範囲の乱数（本番用、衝突しにくい）
//! - **SequentialIdGenerator**: 連番（テスト用、決定的）

use std::sync::atomic::{AtomicI64, Ordering};

use rand::Rng;

use crate::domain::ids::{BucketId, TaskId};

/// Upper bound of generated random ids.
const MAX_RANDOM_ID: i64 = 1_000_000_000_000;

/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn next_task_id(&self) -> TaskId;

    fn next_bucket_id(&self) -> BucketId;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl RandomIdGenerator {
    fn next(&self) -> i64 {
        rand::thread_rng().gen_range(1..=MAX_RANDOM_ID)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_task_id(&self) -> TaskId {
        TaskId::new(self.next())
    }

    fn next_bucket_id(&self) -> BucketId {
        BucketId::new(self.next())
    }
}

/// Hands out `start, start + 1, ...`, shared between tasks and buckets.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicI64,
}

impl SequentialIdGenerator {
    pub fn new(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }

    fn next(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_task_id(&self) -> TaskId {
        TaskId::new(self.next())
    }

    fn next_bucket_id(&self) -> BucketId {
        BucketId::new(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_positive_and_distinct() {
        let id_gen = RandomIdGenerator;

        let ids: Vec<_> = (0..16).map(|_| id_gen.next_task_id()).collect();

        assert!(ids.iter().all(|id| !id.is_unset()));
        // 1e12 の範囲で 16 個、衝突はまず起きない
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn sequential_ids_are_deterministic() {
        let id_gen = SequentialIdGenerator::new(100);

        assert_eq!(id_gen.next_task_id(), TaskId::new(100));
        assert_eq!(id_gen.next_bucket_id(), BucketId::new(101));
        assert_eq!(id_gen.next_task_id(), TaskId::new(102));
    }
}
