// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Relative positions.
//!
//! An index into a sequence shifts whenever content before it changes. A
//! relative position instead names the item next to the position, so it
//! keeps pointing at the same place across concurrent edits. When no item
//! exists on the chosen side the position names the branch itself and
//! resolves to its start or end.

use serde::Deserialize;
use serde::Serialize;

use super::doc::Doc;
use super::id::BranchId;
use super::id::StructId;

/// Which neighbour a relative position sticks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assoc {
    /// Anchored to the item on the left.
    Before,
    /// Anchored to the item on the right.
    After,
}

/// A position that survives concurrent edits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativePosition {
    /// The branch, when the position is not anchored to an item.
    pub scope: Option<BranchId>,
    /// The anchoring item.
    pub item: Option<StructId>,
    pub assoc: Assoc,
}

impl RelativePosition {
    /// A position anchored to the start (`Before`) or end (`After`) of a branch.
    pub fn in_branch(branch: BranchId, assoc: Assoc) -> RelativePosition {
        return RelativePosition { scope: Some(branch), item: None, assoc };
    }

    /// A position anchored to a specific item.
    pub fn at_item(item: StructId, assoc: Assoc) -> RelativePosition {
        return RelativePosition { scope: None, item: Some(item), assoc };
    }
}

/// A resolved relative position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbsolutePosition {
    pub branch: BranchId,
    pub index: usize,
    pub assoc: Assoc,
}

impl Doc {
    /// Create a relative position for `index` inside `branch`.
    ///
    /// With `After`, the position names the item at `index` (or the branch
    /// end). With `Before`, it names the item at `index - 1` (or the branch
    /// start).
    pub fn relative_position(&self, branch: &BranchId, index: usize, assoc: Assoc) -> RelativePosition {
        let mut index = index;
        if assoc == Assoc::Before {
            if index == 0 {
                return RelativePosition::in_branch(branch.clone(), assoc);
            }
            index -= 1;
        }
        let children: &[StructId] = match self.branch(branch) {
            Some(b) => &b.children,
            None => &[],
        };
        for id in children {
            let visible = self.item(id).map_or(false, |item| !item.is_deleted());
            if visible {
                if index == 0 {
                    return RelativePosition::at_item(*id, assoc);
                }
                index -= 1;
            }
        }
        if assoc == Assoc::Before {
            if let Some(last) = children.last() {
                return RelativePosition::at_item(*last, assoc);
            }
        }
        return RelativePosition::in_branch(branch.clone(), assoc);
    }

    /// Follow the chain of undo copies from an item to its live version.
    fn follow_redone(&self, id: StructId) -> Option<StructId> {
        let mut current = id;
        let mut hops = 0;
        loop {
            let item = self.item(&current)?;
            match item.redone {
                Some(next) if hops < self.items.len() => {
                    current = next;
                    hops += 1;
                }
                _ => return Some(current),
            }
        }
    }

    /// Resolve a relative position against the current state.
    ///
    /// Returns `None` when the anchor was never integrated here or its content
    /// was garbage collected. A deleted anchor resolves to the index where it
    /// used to be.
    pub fn absolute_position(&self, rel: &RelativePosition) -> Option<AbsolutePosition> {
        if let Some(anchor) = rel.item {
            if !self.state.contains(&anchor) {
                return None;
            }
            let id = self.follow_redone(anchor)?;
            let item = self.item(&id)?;
            let branch = item.parent.clone();
            let mut index = 0;
            if !self.is_deleted(&branch) {
                if !item.is_deleted() && rel.assoc == Assoc::Before {
                    index = 1;
                }
                let siblings = &self.branch(&branch)?.children;
                for sibling in siblings {
                    if *sibling == id {
                        break;
                    }
                    if self.item(sibling).map_or(false, |s| !s.is_deleted()) {
                        index += 1;
                    }
                }
            }
            return Some(AbsolutePosition { branch, index, assoc: rel.assoc });
        }

        let scope = rel.scope.clone()?;
        let branch = match &scope {
            BranchId::Root(_) => scope,
            BranchId::Item(id) => {
                if !self.state.contains(id) {
                    return None;
                }
                let live = self.follow_redone(*id)?;
                self.item(&live)?.embed_kind()?;
                BranchId::Item(live)
            }
        };
        if !self.exists(&branch) {
            return None;
        }
        let index = match rel.assoc {
            Assoc::After => self.len(&branch),
            Assoc::Before => 0,
        };
        return Some(AbsolutePosition { branch, index, assoc: rel.assoc });
    }
}
