// model = "claude-opus-4-5"
// created = "2026-02-01"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Operations and replication.
//!
//! Every change to a replica is one `Op`. Ops are kept in a log in the order
//! they were integrated, which is always a causal order. To bring a peer up
//! to date, a replica sends the ops the peer's state vector does not cover.
//!
//! Delivery order is not assumed. An op whose dependencies (its parent, its
//! origins, or its targets) are missing waits in a pending queue and is
//! retried whenever another op integrates.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::Value;
use crate::error::Result;
use super::clock::StateVector;
use super::doc::Doc;
use super::doc::Integration;
use super::event::Origin;
use super::event::TransactionEvent;
use super::id::BranchId;
use super::id::StructId;

/// What an insert creates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OpContent {
    /// One character with its initial formats.
    Char { ch: char, formats: BTreeMap<String, Value> },
    Element { name: String },
    Text,
    Hook { name: String },
}

/// The payload of an operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    Insert {
        parent: BranchId,
        left_origin: Option<StructId>,
        right_origin: Option<StructId>,
        content: OpContent,
    },
    Delete {
        targets: Vec<StructId>,
    },
    /// Write (or with `None`, remove) an element attribute.
    SetAttr {
        target: BranchId,
        key: String,
        value: Option<Value>,
    },
    /// Write (or with `None`, remove) a character format.
    Format {
        targets: Vec<StructId>,
        key: String,
        value: Option<Value>,
    },
}

/// A single operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Op {
    pub id: StructId,
    /// Lamport time, used to order attribute and format writes.
    pub time: u64,
    pub kind: OpKind,
}

/// A batch of operations exchanged between replicas.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub ops: Vec<Op>,
}

impl Update {
    pub fn is_empty(&self) -> bool {
        return self.ops.is_empty();
    }

    pub fn len(&self) -> usize {
        return self.ops.len();
    }

    /// Serialize to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        return Ok(serde_json::to_vec(self)?);
    }

    /// Deserialize from bytes produced by `encode`.
    pub fn decode(bytes: &[u8]) -> Result<Update> {
        return Ok(serde_json::from_slice(bytes)?);
    }
}

impl Doc {
    /// The state vector a peer sends to ask for what it is missing.
    pub fn encode_state_vector(&self) -> StateVector {
        return self.state.clone();
    }

    /// Every integrated op not covered by `remote`, in causal order.
    pub fn encode_diff(&self, remote: &StateVector) -> Update {
        let ops: Vec<Op> = self
            .log
            .iter()
            .filter(|op| !remote.contains(&op.id))
            .cloned()
            .collect();
        return Update { ops };
    }

    /// Integrate a remote update. Returns how many ops were applied.
    pub fn apply_update(&mut self, update: Update) -> usize {
        return self.apply_update_with_origin(update, None);
    }

    /// Integrate a remote update, tagging the resulting event with `origin`.
    pub fn apply_update_with_origin(&mut self, update: Update, origin: Option<Origin>) -> usize {
        let mut event = TransactionEvent::new(origin, false);
        let mut queue = std::mem::take(&mut self.pending);
        queue.extend(update.ops);
        let applied = self.integrate_queue(queue, &mut event);
        self.summarize(&mut event);
        self.emit(event);
        return applied;
    }

    fn integrate_queue(&mut self, mut queue: Vec<Op>, event: &mut TransactionEvent) -> usize {
        queue.sort_by_key(|op| op.id);
        let mut applied = 0;
        loop {
            let mut waiting = Vec::new();
            let mut progressed = false;
            for op in queue {
                match self.integrate(&op, event) {
                    Integration::Applied => {
                        applied += 1;
                        progressed = true;
                    }
                    Integration::Duplicate => {}
                    Integration::Blocked => waiting.push(op),
                }
            }
            queue = waiting;
            if !progressed || queue.is_empty() {
                break;
            }
        }
        if !queue.is_empty() {
            debug!(pending = queue.len(), "operations waiting for dependencies");
        }
        self.pending = queue;
        return applied;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attrs;
    use crate::crdt::ClientId;

    fn seeded() -> (Doc, BranchId) {
        let mut doc = Doc::with_client(ClientId(1));
        let root = doc.get_or_insert_fragment("doc");
        let text = doc
            .transact(None, |txn| {
                let text = txn.insert_text(&root, 0)?;
                txn.text_insert(&text, 0, "abc", &Attrs::new())?;
                Ok(text)
            })
            .unwrap();
        return (doc, text);
    }

    #[test]
    fn diff_against_empty_is_everything() {
        let (doc, _) = seeded();
        assert_eq!(doc.encode_diff(&StateVector::new()).len(), 4);
        assert!(doc.encode_diff(&doc.encode_state_vector()).is_empty());
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let (source, text) = seeded();
        let update = source.encode_diff(&StateVector::new());
        let mut replica = Doc::with_client(ClientId(2));
        assert_eq!(replica.apply_update(update.clone()), 4);
        assert_eq!(replica.apply_update(update), 0);
        assert_eq!(replica.text(&text), "abc");
    }

    #[test]
    fn out_of_order_ops_wait_for_dependencies() {
        let (source, text) = seeded();
        let mut ops = source.encode_diff(&StateVector::new()).ops;
        let head = ops.remove(0);
        let mut replica = Doc::with_client(ClientId(2));
        assert_eq!(replica.apply_update(Update { ops }), 0);
        assert_eq!(replica.pending_len(), 3);
        assert_eq!(replica.apply_update(Update { ops: vec![head] }), 4);
        assert_eq!(replica.pending_len(), 0);
        assert_eq!(replica.text(&text), "abc");
    }

    #[test]
    fn encoded_updates_decode() {
        let (source, text) = seeded();
        let bytes = source.encode_diff(&StateVector::new()).encode().unwrap();
        let mut replica = Doc::with_client(ClientId(2));
        replica.apply_update(Update::decode(&bytes).unwrap());
        assert_eq!(replica.text(&text), "abc");
        assert!(Update::decode(b"not json").is_err());
    }
}
