// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Change notifications delivered to deep observers.

use rustc_hash::FxHashSet;

use super::id::BranchId;
use super::id::StructId;

/// A tag identifying who issued a transaction.
///
/// Bindings tag their own writes so their observer can tell self-inflicted
/// changes from remote ones. The undo manager only tracks tagged origins.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    pub fn new(name: impl Into<String>) -> Origin {
        return Origin(name.into());
    }

    pub fn name(&self) -> &str {
        return &self.0;
    }
}

/// Everything one committed transaction changed.
#[derive(Clone, Debug)]
pub struct TransactionEvent {
    pub origin: Option<Origin>,
    /// Whether the transaction was issued on this replica.
    pub local: bool,
    /// Whether the undo manager should record this transaction.
    pub add_to_history: bool,
    /// Branches whose children, text, or attributes changed.
    pub changed: FxHashSet<BranchId>,
    /// Strict ancestors of changed branches.
    pub changed_parents: FxHashSet<BranchId>,
    /// Branches whose embedding item was deleted in this transaction,
    /// including everything nested below them.
    pub deleted: FxHashSet<BranchId>,
    /// Items created by this transaction.
    pub inserted: Vec<StructId>,
    /// Items that became deleted in this transaction.
    pub deleted_items: Vec<StructId>,
    /// Ids of the delete operations issued by this transaction.
    pub delete_ops: Vec<StructId>,
    /// Names of the roots this transaction touched.
    pub roots: FxHashSet<String>,
    /// Number of operations integrated.
    pub ops: usize,
}

impl TransactionEvent {
    pub(crate) fn new(origin: Option<Origin>, local: bool) -> TransactionEvent {
        return TransactionEvent {
            origin,
            local,
            add_to_history: true,
            changed: FxHashSet::default(),
            changed_parents: FxHashSet::default(),
            deleted: FxHashSet::default(),
            inserted: Vec::new(),
            deleted_items: Vec::new(),
            delete_ops: Vec::new(),
            roots: FxHashSet::default(),
            ops: 0,
        };
    }

    /// Whether nothing was integrated.
    pub fn is_empty(&self) -> bool {
        return self.ops == 0;
    }

    /// Whether the transaction carries the given origin tag.
    pub fn is_from(&self, origin: &Origin) -> bool {
        return self.origin.as_ref() == Some(origin);
    }

    /// Whether the transaction touched the named root.
    pub fn touches(&self, root: &str) -> bool {
        return self.roots.contains(root);
    }
}
