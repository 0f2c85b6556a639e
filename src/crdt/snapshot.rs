// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Historical views of a replica.
//!
//! A snapshot is a state vector. Because deletes are ops with their own ids,
//! an item is visible under a snapshot iff the snapshot covers the item's id
//! and none of the delete ops recorded on it.

use super::clock::StateVector;
use super::doc::Content;
use super::doc::Doc;
use super::doc::Item;
use super::doc::Run;
use super::doc::push_char;
use super::id::BranchId;
use super::id::ClientId;
use super::id::StructId;

/// A version boundary of a replica.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub state: StateVector,
}

impl Snapshot {
    pub fn new(state: StateVector) -> Snapshot {
        return Snapshot { state };
    }

    /// The snapshot before anything happened.
    pub fn empty() -> Snapshot {
        return Snapshot::default();
    }

    pub fn covers(&self, id: &StructId) -> bool {
        return self.state.contains(id);
    }

    pub(crate) fn is_visible(&self, item: &Item) -> bool {
        return self.covers(&item.id) && !item.deletions.iter().any(|op| self.covers(op));
    }
}

/// Whether content was added or removed between two snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => return "added",
            ChangeKind::Removed => return "removed",
        }
    }
}

/// Attribution of content visible in exactly one of two snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct YChange {
    pub kind: ChangeKind,
    /// The creating client for additions, the deleting client for removals.
    pub client: ClientId,
}

impl Doc {
    /// The current version boundary.
    pub fn snapshot(&self) -> Snapshot {
        return Snapshot::new(self.state.clone());
    }

    /// Attribution for an item visible under `snapshot` or `prev`.
    /// Returns `None` when the item is visible in neither.
    fn attribute_item(item: &Item, snapshot: &Snapshot, prev: &Snapshot) -> Option<Option<YChange>> {
        let now = snapshot.is_visible(item);
        let before = prev.is_visible(item);
        if !now && !before {
            return None;
        }
        if !now {
            let deleter = item
                .deletions
                .iter()
                .find(|op| snapshot.covers(op))
                .map_or(item.id.client, |op| op.client);
            return Some(Some(YChange { kind: ChangeKind::Removed, client: deleter }));
        }
        if !before {
            return Some(Some(YChange { kind: ChangeKind::Added, client: item.id.client }));
        }
        return Some(None);
    }

    /// Whether a branch is visible under a snapshot. Roots always are.
    pub fn is_visible_at(&self, branch: &BranchId, snapshot: &Snapshot) -> bool {
        match branch {
            BranchId::Root(_) => return true,
            BranchId::Item(id) => return self.item(id).map_or(false, |item| snapshot.is_visible(item)),
        }
    }

    /// Embedded children visible under either snapshot, with attribution.
    pub fn children_diff(&self, branch: &BranchId, snapshot: &Snapshot, prev: &Snapshot) -> Vec<(BranchId, Option<YChange>)> {
        let Some(b) = self.branch(branch) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for id in &b.children {
            let Some(item) = self.item(id) else {
                continue;
            };
            if item.embed_kind().is_none() {
                continue;
            }
            if let Some(change) = Doc::attribute_item(item, snapshot, prev) {
                out.push((BranchId::Item(*id), change));
            }
        }
        return out;
    }

    /// The text of a branch as visible under either snapshot, split into runs
    /// by formats and attribution.
    pub fn text_delta_diff(&self, branch: &BranchId, snapshot: &Snapshot, prev: &Snapshot) -> Vec<Run> {
        let Some(b) = self.branch(branch) else {
            return Vec::new();
        };
        let mut runs = Vec::new();
        for id in &b.children {
            let Some(item) = self.item(id) else {
                continue;
            };
            let Content::Char { ch, .. } = &item.content else {
                continue;
            };
            if let Some(change) = Doc::attribute_item(item, snapshot, prev) {
                push_char(&mut runs, *ch, item.formats(), change);
            }
        }
        return runs;
    }
}
