// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Associates shared branches with the editor nodes last rendered for them.
//!
//! Entries are hints. An entry can be stale when the shared branch changed
//! without the entry being invalidated yet; consumers confirm a hit with
//! `identity_matches` or fall back to a structural comparison.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::crdt::BranchId;
use crate::crdt::StructId;
use crate::crdt::TransactionEvent;
use crate::editor::Node;

/// What a shared branch was rendered as.
#[derive(Clone, Debug)]
pub enum Mapped {
    /// An element branch and its editor element.
    Element(Rc<Node>),
    /// A text branch and the editor text runs it produced, in order.
    Text(Vec<Rc<Node>>),
}

impl Mapped {
    /// Tokens the rendered nodes occupy.
    pub fn size(&self) -> usize {
        match self {
            Mapped::Element(node) => return node.node_size(),
            Mapped::Text(nodes) => return nodes.iter().map(|n| n.node_size()).sum(),
        }
    }
}

/// Shared branch identity to editor nodes.
#[derive(Clone, Debug, Default)]
pub struct Mapping {
    entries: FxHashMap<StructId, Mapped>,
}

impl Mapping {
    pub fn new() -> Mapping {
        return Mapping::default();
    }

    pub fn get(&self, branch: &BranchId) -> Option<&Mapped> {
        return self.entries.get(&branch.item()?);
    }

    /// Record what `branch` rendered as. Roots are never mapped.
    pub fn insert(&mut self, branch: &BranchId, mapped: Mapped) {
        if let Some(id) = branch.item() {
            self.entries.insert(id, mapped);
        }
    }

    pub fn remove(&mut self, branch: &BranchId) -> Option<Mapped> {
        return self.entries.remove(&branch.item()?);
    }

    pub fn contains(&self, branch: &BranchId) -> bool {
        return self.get(branch).is_some();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Size of what `branch` rendered as, or 0 when it is not mapped.
    pub fn node_size(&self, branch: &BranchId) -> usize {
        return self.get(branch).map_or(0, |m| m.size());
    }

    /// Drop the entries a committed transaction may have made stale: the
    /// branches it changed, their ancestors, and everything it deleted.
    pub fn invalidate(&mut self, event: &TransactionEvent) -> usize {
        let before = self.entries.len();
        let touched = event.changed.iter().chain(event.changed_parents.iter()).chain(event.deleted.iter());
        for branch in touched {
            self.remove(branch);
        }
        return before - self.entries.len();
    }
}
