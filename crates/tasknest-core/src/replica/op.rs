//! Operation identity, operations and the update wire format.
//!
//! - `ActorId`: random per process, identifies the replica that authored an op
//! - `OpId`: `(counter, actor)`, where `counter` is a Lamport clock
//! - `Update`: a batch of ops; the unit that is persisted and exchanged

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::CodecError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl ActorId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({:016x})", self.0)
    }
}

/// Globally unique operation identifier.
///
/// **Ordering**: `(counter, actor)`. The counter of a new local op is greater than every
/// counter the replica has seen, so a later op always sorts after the ops it observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId {
    pub counter: u64,
    pub actor: ActorId,
}

impl OpId {
    pub fn new(counter: u64, actor: ActorId) -> Self {
        Self { counter, actor }
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.actor.cmp(&other.actor))
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Place `value` right after `parent` (or at the head of the list).
    ListInsert {
        id: OpId,
        list: String,
        parent: Option<OpId>,
        value: Value,
    },
    /// Tombstone the item inserted by `target`.
    ListDelete { id: OpId, list: String, target: OpId },
    /// Last-writer-wins assignment of `map[key]`.
    MapSet {
        id: OpId,
        map: String,
        key: String,
        value: Value,
    },
}

impl Op {
    pub fn id(&self) -> OpId {
        match self {
            Op::ListInsert { id, .. } | Op::ListDelete { id, .. } | Op::MapSet { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub ops: Vec<Op>,
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// CBOR-encode the update.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn op_ids_order_by_counter_then_actor() {
        let a = ActorId(1);
        let b = ActorId(2);
        assert!(OpId::new(1, b) < OpId::new(2, a));
        assert!(OpId::new(3, a) < OpId::new(3, b));
    }

    #[test]
    fn update_survives_cbor() {
        let actor = ActorId(0xfeed);
        let update = Update {
            ops: vec![
                Op::ListInsert {
                    id: OpId::new(1, actor),
                    list: "tasks".into(),
                    parent: None,
                    value: json!({"id": 1, "position": 65536.0, "title": "t"}),
                },
                Op::MapSet {
                    id: OpId::new(2, actor),
                    map: "bucketsMap".into(),
                    key: "buckets".into(),
                    value: json!([{"id": 1}]),
                },
            ],
        };
        let bytes = update.encode().unwrap();
        assert_eq!(Update::decode(&bytes).unwrap(), update);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(matches!(
            Update::decode(&[0xff, 0x00, 0x13]),
            Err(CodecError::Decode(_))
        ));
    }
}
