//! Position allocator for sibling ordering keys.

use std::cmp::Ordering;

use super::errors::StoreError;

/// Initial ordering key handed to entities created with position 0 (2^16).
pub const DEFAULT_POSITION: f64 = 65536.0;

/// Returns [`DEFAULT_POSITION`] when `position` is exactly zero, otherwise `position`.
///
/// Siblings that are all created with 0 collide on the same key; readers break such
/// ties with [`cmp_position`].
pub fn default_position_if_zero(position: f64) -> f64 {
    if position == 0.0 {
        return DEFAULT_POSITION;
    }
    position
}

/// Refuse NaN and infinities for a numeric record field.
pub fn ensure_finite(field: &'static str, value: f64) -> Result<(), StoreError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::NonFinite { field, value })
    }
}

/// Ascending order by position, then by a secondary key (the record id).
///
/// Equal positions would otherwise leave the relative order of two records up to
/// document order, which differs between replicas.
pub fn cmp_position<K: Ord>(a: (f64, K), b: (f64, K)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}
