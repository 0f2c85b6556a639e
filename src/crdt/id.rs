// model = "claude-opus-4-5"
// created = "2026-02-01"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Identifier types for the replicated tree.
//!
//! # Identifier Hierarchy
//!
//! - `ClientId`: a replica, derived from its public key
//! - `StructId`: one operation or item (client, clock)
//! - `Stamp`: a Lamport timestamp used for last-writer-wins registers
//! - `BranchId`: a node of the tree (a named root or an embedded item)
//!
//! IDs are designed to be:
//! - Globally unique: (client, clock) pairs are never reused
//! - Totally ordered: can be compared deterministically on every replica
//! - Hashable: can be used as map keys

use serde::Deserialize;
use serde::Serialize;

use crate::key::KeyPub;
use crate::key::hash;

/// A replica identifier.
///
/// The first eight bytes of the blake3 hash of the replica's public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Derive the client id for a public key.
    pub fn from_key(key: &KeyPub) -> ClientId {
        let digest = hash(&key.0);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.0[..8]);
        return ClientId(u64::from_le_bytes(bytes));
    }
}

impl std::fmt::Debug for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "ClientId({:016x})", self.0);
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "{:016x}", self.0);
    }
}

/// An operation identifier.
///
/// Every operation a replica issues consumes one tick of that replica's
/// clock, so `(client, clock)` is unique and the clocks of one client are
/// contiguous. Items are identified by the id of the insert that created them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructId {
    pub client: ClientId,
    pub clock: u64,
}

impl StructId {
    /// Create a new struct id.
    pub fn new(client: ClientId, clock: u64) -> StructId {
        return StructId { client, clock };
    }
}

impl std::fmt::Debug for StructId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "{:016x}#{}", self.client.0, self.clock);
    }
}

/// A Lamport timestamp, totally ordered by time and then client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stamp {
    pub time: u64,
    pub client: ClientId,
}

/// Identifies a branch of the tree: something that has children or text.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BranchId {
    /// A named top-level fragment. Roots exist implicitly on every replica.
    Root(String),
    /// A branch embedded in its parent by the item with this id.
    Item(StructId),
}

impl BranchId {
    /// Create a root branch id.
    pub fn root(name: &str) -> BranchId {
        return BranchId::Root(name.to_string());
    }

    /// The id of the item that embeds this branch, if any.
    pub fn item(&self) -> Option<StructId> {
        match self {
            BranchId::Root(_) => return None,
            BranchId::Item(id) => return Some(*id),
        }
    }

    /// Whether this is a top-level fragment.
    pub fn is_root(&self) -> bool {
        return matches!(self, BranchId::Root(_));
    }
}

impl std::fmt::Debug for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchId::Root(name) => return write!(f, "Root({})", name),
            BranchId::Item(id) => return write!(f, "Item({:?})", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_is_stable_for_key() {
        let key = KeyPub([3; 32]);
        assert_eq!(ClientId::from_key(&key), ClientId::from_key(&key));
        assert_ne!(ClientId::from_key(&key), ClientId::from_key(&KeyPub([4; 32])));
    }

    #[test]
    fn struct_ids_order_by_client_then_clock() {
        let a = StructId::new(ClientId(1), 9);
        let b = StructId::new(ClientId(2), 0);
        let c = StructId::new(ClientId(2), 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn stamps_order_by_time_then_client() {
        let a = Stamp { time: 1, client: ClientId(9) };
        let b = Stamp { time: 2, client: ClientId(1) };
        let c = Stamp { time: 2, client: ClientId(2) };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn branch_id_item_accessor() {
        let id = StructId::new(ClientId(1), 4);
        assert_eq!(BranchId::Item(id).item(), Some(id));
        assert_eq!(BranchId::root("doc").item(), None);
        assert!(BranchId::root("doc").is_root());
    }
}
