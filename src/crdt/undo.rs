// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Selective undo for one root of a shared replica.
//!
//! The manager observes committed transactions. Local transactions whose
//! origin is tracked and that touch the scoped root are recorded as stack
//! items holding the ids they inserted and deleted. Undoing an item deletes
//! what it inserted and re-creates copies of what it deleted; the copies get
//! fresh ids and the originals remember them through `redone`, so relative
//! positions anchored on the originals follow along.
//!
//! Only structure and text are reverted. Attribute and format writes are
//! not recorded.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::Result;
use super::SharedDoc;
use super::doc::BranchKind;
use super::doc::Content;
use super::doc::Doc;
use super::doc::Subscription;
use super::event::Origin;
use super::event::TransactionEvent;
use super::id::BranchId;
use super::id::StructId;
use super::txn::Transaction;
use super::update::OpContent;
use super::update::OpKind;

/// Arbitrary data attached to a stack item by whoever pushed it.
pub type StackMeta = Rc<dyn Any>;

/// One undoable unit.
#[derive(Clone, Default)]
pub struct StackItem {
    insertions: FxHashSet<StructId>,
    deletions: FxHashSet<StructId>,
    /// Filled by `on_item_added` hooks and handed back on undo/redo.
    pub meta: FxHashMap<String, StackMeta>,
}

impl StackItem {
    fn from_event(event: &TransactionEvent) -> StackItem {
        let mut item = StackItem::default();
        item.absorb(event);
        return item;
    }

    fn absorb(&mut self, event: &TransactionEvent) {
        self.insertions.extend(event.inserted.iter().copied());
        self.deletions.extend(event.deleted_items.iter().copied());
    }

    pub fn insertions(&self) -> usize {
        return self.insertions.len();
    }

    pub fn deletions(&self) -> usize {
        return self.deletions.len();
    }
}

impl std::fmt::Debug for StackItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("StackItem")
            .field("insertions", &self.insertions.len())
            .field("deletions", &self.deletions.len())
            .field("meta", &self.meta.keys().collect::<Vec<_>>())
            .finish();
    }
}

/// Options for an undo manager.
#[derive(Clone, Debug)]
pub struct UndoOptions {
    /// Origins whose transactions are recorded. `None` stands for untagged
    /// local transactions.
    pub tracked_origins: FxHashSet<Option<Origin>>,
    /// Merge consecutive transactions into one stack item until
    /// `stop_capturing` is called.
    pub capture_transactions: bool,
}

impl Default for UndoOptions {
    fn default() -> Self {
        let mut tracked_origins = FxHashSet::default();
        tracked_origins.insert(None);
        return UndoOptions {
            tracked_origins,
            capture_transactions: false,
        };
    }
}

type AddedHook = Box<dyn FnMut(&mut StackItem)>;

struct UndoState {
    scope: String,
    options: UndoOptions,
    own_origin: Origin,
    undo_stack: Vec<StackItem>,
    redo_stack: Vec<StackItem>,
    undoing: bool,
    redoing: bool,
    capturing: bool,
    on_added: Vec<AddedHook>,
}

impl UndoState {
    fn observe(&mut self, event: &TransactionEvent) {
        if !event.local || event.is_empty() || !event.touches(&self.scope) {
            return;
        }
        let ours = event.is_from(&self.own_origin);
        if !ours && (!event.add_to_history || !self.options.tracked_origins.contains(&event.origin)) {
            return;
        }
        if !ours {
            self.redo_stack.clear();
        }
        if self.undoing {
            self.push_redo(event);
            return;
        }
        if self.redoing {
            self.push_undo(event);
            return;
        }
        if self.capturing {
            if let Some(last) = self.undo_stack.last_mut() {
                last.absorb(event);
                return;
            }
        }
        self.push_undo(event);
        self.capturing = self.options.capture_transactions;
    }

    fn push_undo(&mut self, event: &TransactionEvent) {
        let mut item = StackItem::from_event(event);
        for hook in self.on_added.iter_mut() {
            hook(&mut item);
        }
        self.undo_stack.push(item);
    }

    fn push_redo(&mut self, event: &TransactionEvent) {
        let mut item = StackItem::from_event(event);
        for hook in self.on_added.iter_mut() {
            hook(&mut item);
        }
        self.redo_stack.push(item);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Undo,
    Redo,
}

/// Undo/redo stacks for one root of a shared replica.
pub struct UndoManager {
    doc: SharedDoc,
    state: Rc<RefCell<UndoState>>,
    subscription: Option<Subscription>,
}

impl UndoManager {
    /// Track changes to the root named `scope`.
    pub fn new(doc: &SharedDoc, scope: &str, options: UndoOptions) -> UndoManager {
        let state = Rc::new(RefCell::new(UndoState {
            scope: scope.to_string(),
            options,
            own_origin: Origin::new(format!("undo:{}", scope)),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            undoing: false,
            redoing: false,
            capturing: false,
            on_added: Vec::new(),
        }));
        let observed = state.clone();
        let subscription = doc.borrow_mut().observe_deep(move |event| {
            if let Ok(mut state) = observed.try_borrow_mut() {
                state.observe(event);
            }
        });
        return UndoManager {
            doc: doc.clone(),
            state,
            subscription: Some(subscription),
        };
    }

    /// Record transactions carrying `origin`.
    pub fn add_tracked_origin(&self, origin: Option<Origin>) {
        self.state.borrow_mut().options.tracked_origins.insert(origin);
    }

    /// Run `hook` on every stack item as it is pushed, on either stack.
    pub fn on_item_added<F>(&self, hook: F)
    where
        F: FnMut(&mut StackItem) + 'static,
    {
        self.state.borrow_mut().on_added.push(Box::new(hook));
    }

    /// The origin tag of the manager's own transactions.
    pub fn origin(&self) -> Origin {
        return self.state.borrow().own_origin.clone();
    }

    pub fn undo_stack_len(&self) -> usize {
        return self.state.borrow().undo_stack.len();
    }

    pub fn redo_stack_len(&self) -> usize {
        return self.state.borrow().redo_stack.len();
    }

    pub fn can_undo(&self) -> bool {
        return self.undo_stack_len() > 0;
    }

    pub fn can_redo(&self) -> bool {
        return self.redo_stack_len() > 0;
    }

    /// End the current capture so the next transaction starts a new item.
    pub fn stop_capturing(&self) {
        self.state.borrow_mut().capturing = false;
    }

    /// Drop both stacks.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.undo_stack.clear();
        state.redo_stack.clear();
        state.capturing = false;
    }

    /// Revert the most recent undo item that still has an effect.
    pub fn undo(&self) -> Result<Option<StackItem>> {
        return self.pop(Side::Undo);
    }

    /// Reapply the most recently undone item that still has an effect.
    pub fn redo(&self) -> Result<Option<StackItem>> {
        return self.pop(Side::Redo);
    }

    fn pop(&self, side: Side) -> Result<Option<StackItem>> {
        loop {
            let (item, scope, origin) = {
                let mut state = self.state.borrow_mut();
                let popped = match side {
                    Side::Undo => state.undo_stack.pop(),
                    Side::Redo => state.redo_stack.pop(),
                };
                let Some(item) = popped else {
                    return Ok(None);
                };
                state.capturing = false;
                match side {
                    Side::Undo => state.undoing = true,
                    Side::Redo => state.redoing = true,
                }
                (item, state.scope.clone(), state.own_origin.clone())
            };
            let performed = self
                .doc
                .borrow_mut()
                .transact(Some(origin), |txn| revert(txn, &item, &scope));
            {
                let mut state = self.state.borrow_mut();
                state.undoing = false;
                state.redoing = false;
            }
            if performed? {
                debug!(
                    insertions = item.insertions.len(),
                    deletions = item.deletions.len(),
                    redo = side == Side::Redo,
                    "stack item reverted"
                );
                return Ok(Some(item));
            }
        }
    }

    /// Stop observing the replica. The stacks are kept.
    pub fn destroy(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            if let Ok(mut doc) = self.doc.try_borrow_mut() {
                doc.unobserve_deep(subscription);
            }
        }
    }
}

impl Drop for UndoManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

// =============================================================================
// Reverting
// =============================================================================

/// The name of the root a branch hangs from.
fn root_of(doc: &Doc, branch: &BranchId) -> Option<String> {
    let mut current = branch.clone();
    loop {
        if let BranchId::Root(name) = &current {
            return Some(name.clone());
        }
        current = doc.parent(&current)?;
    }
}

fn in_scope(doc: &Doc, id: &StructId, scope: &str) -> bool {
    let Some(item) = doc.item(id) else {
        return false;
    };
    return root_of(doc, &item.parent).as_deref() == Some(scope);
}

fn live_version(doc: &Doc, id: StructId) -> StructId {
    let mut current = id;
    let mut hops = 0;
    while let Some(next) = doc.item(&current).and_then(|item| item.redone) {
        if hops > doc.items.len() {
            break;
        }
        current = next;
        hops += 1;
    }
    return current;
}

/// Apply the inverse of a stack item. Returns whether anything changed.
fn revert(txn: &mut Transaction<'_>, item: &StackItem, scope: &str) -> Result<bool> {
    let mut to_redo: Vec<StructId> = item
        .deletions
        .iter()
        .filter(|id| !item.insertions.contains(id) && in_scope(txn.doc(), id, scope))
        .copied()
        .collect();
    to_redo.sort();
    let redo_set: FxHashSet<StructId> = to_redo.iter().copied().collect();

    let mut to_delete: Vec<StructId> = Vec::new();
    for id in &item.insertions {
        let live = live_version(txn.doc(), *id);
        let doc = txn.doc();
        let alive = doc.item(&live).map_or(false, |it| !it.is_deleted());
        if alive && in_scope(doc, &live, scope) {
            to_delete.push(live);
        }
    }
    to_delete.sort();

    let mut performed = false;
    for id in to_redo {
        if redo_item(txn, id, &redo_set, 0)?.is_some() {
            performed = true;
        }
    }
    if !to_delete.is_empty() {
        txn.delete_items(to_delete);
        performed = true;
    }
    return Ok(performed);
}

/// Follow `id` through redo copies until reaching an item living in `parent`.
fn trace_into(doc: &Doc, id: StructId, parent: &BranchId) -> Option<StructId> {
    let mut current = id;
    for _ in 0..=doc.items.len() {
        let item = doc.item(&current)?;
        if &item.parent == parent {
            return Some(current);
        }
        current = item.redone?;
    }
    return None;
}

/// Re-create a deleted item as a fresh copy next to where it was.
fn redo_item(
    txn: &mut Transaction<'_>,
    id: StructId,
    redo_set: &FxHashSet<StructId>,
    depth: usize,
) -> Result<Option<StructId>> {
    if depth > crate::MAX_DEPTH {
        return Ok(None);
    }
    let Some(item) = txn.doc().item(&id).cloned() else {
        return Ok(None);
    };
    if let Some(redone) = item.redone {
        return Ok(Some(live_version(txn.doc(), redone)));
    }
    if !item.is_deleted() {
        return Ok(None);
    }

    let parent = match &item.parent {
        BranchId::Root(_) => item.parent.clone(),
        BranchId::Item(parent_id) => {
            let Some(parent_item) = txn.doc().item(parent_id) else {
                return Ok(None);
            };
            if parent_item.is_deleted() {
                if parent_item.redone.is_none() {
                    if !redo_set.contains(parent_id) {
                        return Ok(None);
                    }
                    if redo_item(txn, *parent_id, redo_set, depth + 1)?.is_none() {
                        return Ok(None);
                    }
                }
                BranchId::Item(live_version(txn.doc(), *parent_id))
            } else {
                item.parent.clone()
            }
        }
    };

    let (left_origin, right_origin) = {
        let doc = txn.doc();
        let siblings: &[StructId] = match doc.branch(&item.parent) {
            Some(b) => &b.children,
            None => &[],
        };
        let at = siblings.iter().position(|s| *s == id).unwrap_or(0);
        let left = siblings[..at].iter().rev().find_map(|s| trace_into(doc, *s, &parent));
        let right = siblings[at..].iter().find_map(|s| trace_into(doc, *s, &parent));
        (left, right)
    };

    let content = match &item.content {
        Content::Char { ch, .. } => OpContent::Char { ch: *ch, formats: item.formats() },
        Content::Embed(kind) => {
            let name = txn.doc().name(&BranchId::Item(id)).unwrap_or("").to_string();
            match kind {
                BranchKind::Element => OpContent::Element { name },
                BranchKind::Hook => OpContent::Hook { name },
                BranchKind::Text => OpContent::Text,
                BranchKind::Fragment => return Ok(None),
            }
        }
    };
    let copy = txn.apply_local(OpKind::Insert {
        parent,
        left_origin,
        right_origin,
        content,
    });
    if let Some(original) = txn.doc_mut().items.get_mut(&id) {
        original.redone = Some(copy);
    }
    if item.embed_kind().is_some() {
        let attrs = txn.doc().attributes(&BranchId::Item(id));
        for (key, value) in attrs {
            txn.apply_local(OpKind::SetAttr {
                target: BranchId::Item(copy),
                key,
                value: Some(value),
            });
        }
    }
    return Ok(Some(copy));
}
