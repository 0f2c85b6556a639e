// model = "claude-opus-4-5"
// created = "2026-01-30"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! The replicated tree.
//!
//! A `Doc` holds every item any replica has created, tombstones included.
//! Items live in a flat map keyed by `StructId`; each branch (a named root
//! or an embedded element/text/hook) keeps its children as an ordered list
//! of item ids. Children are ordered with YATA: every item records its left
//! origin (what was to its left when inserted) and right origin (what was to
//! its right). These origins are immutable and capture the insertion context,
//! so concurrent inserts land in the same order on every replica.
//!
//! Text branches hold one item per character. Characters carry a format map
//! and elements carry an attribute map; both are last-writer-wins registers
//! ordered by Lamport `Stamp`.
//!
//! All mutation goes through a `Transaction` (see `txn.rs`) or through
//! `apply_update` (see `update.rs`). Both funnel into `integrate`, which is
//! the only place that touches the item store.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::debug;
use tracing::warn;

use crate::Attrs;
use crate::Value;
use crate::error::Result;
use crate::key::KeyPub;
use super::clock::LamportClock;
use super::clock::StateVector;
use super::event::Origin;
use super::event::TransactionEvent;
use super::id::BranchId;
use super::id::ClientId;
use super::id::Stamp;
use super::id::StructId;
use super::snapshot::YChange;
use super::txn::Transaction;
use super::update::Op;
use super::update::OpContent;
use super::update::OpKind;

// =============================================================================
// Items and branches
// =============================================================================

/// The kind of a branch. Every branch carries its kind explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchKind {
    /// A named top-level fragment.
    Fragment,
    /// A named element with attributes and embedded children.
    Element,
    /// A run of formatted characters.
    Text,
    /// An opaque attribute-only node with no editor counterpart.
    Hook,
}

impl BranchKind {
    /// Whether this kind can embed other branches.
    pub fn is_container(self) -> bool {
        return matches!(self, BranchKind::Fragment | BranchKind::Element);
    }
}

/// A last-writer-wins register. `None` records a removal.
#[derive(Clone, Debug)]
pub(crate) struct Lww {
    pub value: Option<Value>,
    pub stamp: Stamp,
}

/// What an item holds.
#[derive(Clone, Debug)]
pub(crate) enum Content {
    /// One character of a text branch.
    Char { ch: char, formats: BTreeMap<String, Lww> },
    /// An embedded branch, stored in `Doc::branches` under `BranchId::Item`.
    Embed(BranchKind),
}

/// One unit of a sequence: a character or an embedded branch.
#[derive(Clone, Debug)]
pub(crate) struct Item {
    pub id: StructId,
    pub parent: BranchId,
    pub left_origin: Option<StructId>,
    pub right_origin: Option<StructId>,
    pub content: Content,
    /// Ids of the delete operations that removed this item.
    pub deletions: SmallVec<[StructId; 1]>,
    /// Set when an undo re-created this item under a new id.
    pub redone: Option<StructId>,
}

impl Item {
    pub fn is_deleted(&self) -> bool {
        return !self.deletions.is_empty();
    }

    pub fn embed_kind(&self) -> Option<BranchKind> {
        match &self.content {
            Content::Embed(kind) => return Some(*kind),
            Content::Char { .. } => return None,
        }
    }

    /// The current formats of a character, removals dropped.
    pub fn formats(&self) -> Attrs {
        let mut attrs = Attrs::new();
        if let Content::Char { formats, .. } = &self.content {
            for (key, entry) in formats {
                if let Some(value) = &entry.value {
                    attrs.insert(key.clone(), value.clone());
                }
            }
        }
        return attrs;
    }
}

/// A node of the tree that owns a sequence of items.
#[derive(Clone, Debug)]
pub(crate) struct Branch {
    pub kind: BranchKind,
    pub name: Option<String>,
    pub attrs: BTreeMap<String, Lww>,
    pub children: Vec<StructId>,
    /// Set once garbage collection dropped this branch's content.
    pub collected: bool,
}

impl Branch {
    fn new(kind: BranchKind, name: Option<String>) -> Branch {
        return Branch {
            kind,
            name,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            collected: false,
        };
    }
}

/// A maximal run of characters sharing the same formats (and, for snapshot
/// diffs, the same attribution).
#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub insert: String,
    pub attributes: Attrs,
    pub change: Option<YChange>,
}

/// Outcome of integrating one operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Integration {
    Applied,
    /// Already integrated; dropped.
    Duplicate,
    /// Waiting for earlier operations.
    Blocked,
}

// =============================================================================
// Doc
// =============================================================================

/// Options for a replica.
#[derive(Clone, Debug)]
pub struct DocOptions {
    /// Fixed client id. A random keypair is generated when unset.
    pub client: Option<ClientId>,
    /// Whether `collect_garbage` may drop the content of deleted branches.
    /// Snapshot rendering needs history, so it requires `gc = false`.
    pub gc: bool,
}

impl Default for DocOptions {
    fn default() -> Self {
        return DocOptions { client: None, gc: true };
    }
}

/// Handle returned by `observe_deep`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Observer = Box<dyn FnMut(&TransactionEvent)>;

/// One replica of a shared tree.
pub struct Doc {
    client: ClientId,
    options: DocOptions,
    pub(crate) items: FxHashMap<StructId, Item>,
    pub(crate) branches: FxHashMap<BranchId, Branch>,
    /// Ids whose content was dropped by garbage collection.
    pub(crate) collected: FxHashSet<StructId>,
    pub(crate) state: StateVector,
    pub(crate) clock: LamportClock,
    /// Every integrated operation, in causal order.
    pub(crate) log: Vec<Op>,
    /// Remote operations waiting for their dependencies.
    pub(crate) pending: Vec<Op>,
    observers: Vec<(u64, Observer)>,
    next_subscription: u64,
    next_binding: u64,
}

impl Default for Doc {
    fn default() -> Self {
        return Self::new();
    }
}

impl std::fmt::Debug for Doc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("Doc")
            .field("client", &self.client)
            .field("items", &self.items.len())
            .field("pending", &self.pending.len())
            .finish();
    }
}

impl Doc {
    /// Create a replica with a freshly generated identity.
    pub fn new() -> Doc {
        return Doc::with_options(DocOptions::default());
    }

    /// Create a replica with the given options.
    pub fn with_options(options: DocOptions) -> Doc {
        let client = match options.client {
            Some(client) => client,
            None => ClientId::from_key(&KeyPub::generate()),
        };
        return Doc {
            client,
            options,
            items: FxHashMap::default(),
            branches: FxHashMap::default(),
            collected: FxHashSet::default(),
            state: StateVector::new(),
            clock: LamportClock::new(),
            log: Vec::new(),
            pending: Vec::new(),
            observers: Vec::new(),
            next_subscription: 0,
            next_binding: 0,
        };
    }

    /// Create a replica writing as the given client.
    pub fn with_client(client: ClientId) -> Doc {
        return Doc::with_options(DocOptions {
            client: Some(client),
            ..DocOptions::default()
        });
    }

    /// Hand out an id for a new editor binding, unique within this replica.
    pub fn next_binding_id(&mut self) -> u64 {
        let id = self.next_binding;
        self.next_binding += 1;
        return id;
    }

    /// This replica's client id.
    pub fn client_id(&self) -> ClientId {
        return self.client;
    }

    pub fn options(&self) -> &DocOptions {
        return &self.options;
    }

    /// Get (creating if needed) the named top-level fragment.
    pub fn get_or_insert_fragment(&mut self, name: &str) -> BranchId {
        return self.ensure_root(name);
    }

    pub(crate) fn ensure_root(&mut self, name: &str) -> BranchId {
        let id = BranchId::root(name);
        self.branches
            .entry(id.clone())
            .or_insert_with(|| Branch::new(BranchKind::Fragment, Some(name.to_string())));
        return id;
    }

    /// The state vector of everything integrated so far.
    pub fn state_vector(&self) -> StateVector {
        return self.state.clone();
    }

    /// Number of remote operations waiting for missing dependencies.
    pub fn pending_len(&self) -> usize {
        return self.pending.len();
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) fn item(&self, id: &StructId) -> Option<&Item> {
        return self.items.get(id);
    }

    pub(crate) fn branch(&self, branch: &BranchId) -> Option<&Branch> {
        return self.branches.get(branch);
    }

    /// The kind of a branch. Roots are fragments even before first use.
    pub fn kind(&self, branch: &BranchId) -> Option<BranchKind> {
        if branch.is_root() {
            return Some(BranchKind::Fragment);
        }
        return self.branches.get(branch).map(|b| b.kind);
    }

    /// The element or hook name of a branch.
    pub fn name(&self, branch: &BranchId) -> Option<&str> {
        return self.branches.get(branch).and_then(|b| b.name.as_deref());
    }

    /// Whether the branch is known and its content has not been collected.
    pub fn exists(&self, branch: &BranchId) -> bool {
        if branch.is_root() {
            return true;
        }
        return self.branches.get(branch).map_or(false, |b| !b.collected);
    }

    /// Whether the item embedding this branch was deleted.
    pub fn is_deleted(&self, branch: &BranchId) -> bool {
        match branch {
            BranchId::Root(_) => return false,
            BranchId::Item(id) => {
                if self.collected.contains(id) {
                    return true;
                }
                return self.items.get(id).map_or(true, |item| item.is_deleted());
            }
        }
    }

    /// The branch that embeds this one.
    pub fn parent(&self, branch: &BranchId) -> Option<BranchId> {
        let id = branch.item()?;
        return self.items.get(&id).map(|item| item.parent.clone());
    }

    /// The client that created this branch.
    pub fn creator(&self, branch: &BranchId) -> Option<ClientId> {
        return branch.item().map(|id| id.client);
    }

    /// Whether `ancestor` strictly contains `descendant`.
    pub fn is_ancestor(&self, ancestor: &BranchId, descendant: &BranchId) -> bool {
        let mut current = self.parent(descendant);
        while let Some(branch) = current {
            if &branch == ancestor {
                return true;
            }
            current = self.parent(&branch);
        }
        return false;
    }

    /// Iterate the visible items of a branch in document order.
    pub(crate) fn visible_items<'a>(&'a self, branch: &BranchId) -> impl Iterator<Item = &'a Item> + 'a {
        let children: &'a [StructId] = match self.branches.get(branch) {
            Some(b) => &b.children,
            None => &[],
        };
        return children
            .iter()
            .filter_map(move |id| self.items.get(id))
            .filter(|item| !item.is_deleted());
    }

    /// Visible length: characters for text, embedded children otherwise.
    pub fn len(&self, branch: &BranchId) -> usize {
        return self.visible_items(branch).count();
    }

    /// The visible embedded children of a container.
    pub fn children(&self, branch: &BranchId) -> Vec<BranchId> {
        return self
            .visible_items(branch)
            .filter(|item| item.embed_kind().is_some())
            .map(|item| BranchId::Item(item.id))
            .collect();
    }

    /// First visible item of a branch.
    pub(crate) fn first_visible_child(&self, branch: &BranchId) -> Option<StructId> {
        return self.visible_items(branch).next().map(|item| item.id);
    }

    /// The next visible sibling of an item.
    pub(crate) fn next_visible_sibling(&self, id: &StructId) -> Option<StructId> {
        let item = self.items.get(id)?;
        let branch = self.branches.get(&item.parent)?;
        let at = branch.children.iter().position(|c| c == id)?;
        for next in &branch.children[at + 1..] {
            if let Some(next_item) = self.items.get(next) {
                if !next_item.is_deleted() {
                    return Some(*next);
                }
            }
        }
        return None;
    }

    /// The item immediately right of `id` in its parent, tombstones included.
    pub(crate) fn right_sibling(&self, id: &StructId) -> Option<StructId> {
        let item = self.items.get(id)?;
        let branch = self.branches.get(&item.parent)?;
        let at = branch.children.iter().position(|c| c == id)?;
        return branch.children.get(at + 1).copied();
    }

    /// Current attributes of an element or hook.
    pub fn attributes(&self, branch: &BranchId) -> Attrs {
        let mut attrs = Attrs::new();
        if let Some(b) = self.branches.get(branch) {
            for (key, entry) in &b.attrs {
                if let Some(value) = &entry.value {
                    attrs.insert(key.clone(), value.clone());
                }
            }
        }
        return attrs;
    }

    /// A single attribute value.
    pub fn attribute(&self, branch: &BranchId, key: &str) -> Option<&Value> {
        let entry = self.branches.get(branch)?.attrs.get(key)?;
        return entry.value.as_ref();
    }

    /// The plain string content of a text branch.
    pub fn text(&self, branch: &BranchId) -> String {
        let mut out = String::new();
        for item in self.visible_items(branch) {
            if let Content::Char { ch, .. } = &item.content {
                out.push(*ch);
            }
        }
        return out;
    }

    /// The content of a text branch as maximal same-format runs.
    pub fn text_delta(&self, branch: &BranchId) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        for item in self.visible_items(branch) {
            let Content::Char { ch, .. } = &item.content else {
                continue;
            };
            push_char(&mut runs, *ch, item.formats(), None);
        }
        return runs;
    }

    /// Render a branch as an XML-like string. Handy for tests and logs.
    pub fn to_xml(&self, branch: &BranchId) -> String {
        let mut out = String::new();
        self.write_xml(branch, &mut out, 0);
        return out;
    }

    fn write_xml(&self, branch: &BranchId, out: &mut String, depth: usize) {
        if depth > crate::MAX_DEPTH {
            return;
        }
        match self.kind(branch) {
            Some(BranchKind::Text) => out.push_str(&self.text(branch)),
            Some(BranchKind::Fragment) => {
                for child in self.children(branch) {
                    self.write_xml(&child, out, depth + 1);
                }
            }
            Some(BranchKind::Element) | Some(BranchKind::Hook) => {
                let name = self.name(branch).unwrap_or("");
                out.push('<');
                out.push_str(name);
                for (key, value) in self.attributes(branch) {
                    out.push_str(&format!(" {}={}", key, value));
                }
                out.push('>');
                for child in self.children(branch) {
                    self.write_xml(&child, out, depth + 1);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            None => {}
        }
    }

    // =========================================================================
    // Transactions and observers
    // =========================================================================

    /// Run `f` inside one atomic transaction tagged with `origin`.
    ///
    /// Observers are notified once, after `f` returns, with everything the
    /// transaction changed. Operations applied before an error are kept.
    pub fn transact<T, F>(&mut self, origin: Option<Origin>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut txn = Transaction::new(self, origin, true);
        let result = f(&mut txn);
        let event = txn.finish();
        self.emit(event);
        return result;
    }

    /// Register an observer for every committed change to this replica.
    pub fn observe_deep<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&TransactionEvent) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        return Subscription(id);
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unobserve_deep(&mut self, subscription: Subscription) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(id, _)| *id != subscription.0);
        return self.observers.len() != before;
    }

    pub(crate) fn emit(&mut self, event: TransactionEvent) {
        if event.is_empty() {
            return;
        }
        debug!(
            ops = event.ops,
            changed = event.changed.len(),
            deleted = event.deleted.len(),
            local = event.local,
            "transaction committed"
        );
        let mut observers = std::mem::take(&mut self.observers);
        for (_, observer) in observers.iter_mut() {
            observer(&event);
        }
        self.observers = observers;
    }

    // =========================================================================
    // Integration
    // =========================================================================

    fn present(&self, id: &StructId) -> bool {
        return self.items.contains_key(id) || self.collected.contains(id);
    }

    fn dependencies_met(&self, op: &Op) -> bool {
        match &op.kind {
            OpKind::Insert { parent, left_origin, right_origin, .. } => {
                if let BranchId::Item(parent_id) = parent {
                    if !self.present(parent_id) {
                        return false;
                    }
                }
                let left_ok = left_origin.map_or(true, |id| self.present(&id));
                let right_ok = right_origin.map_or(true, |id| self.present(&id));
                return left_ok && right_ok;
            }
            OpKind::Delete { targets } => return targets.iter().all(|id| self.present(id)),
            OpKind::SetAttr { target, .. } => match target {
                BranchId::Root(_) => return true,
                BranchId::Item(id) => return self.present(id),
            },
            OpKind::Format { targets, .. } => return targets.iter().all(|id| self.present(id)),
        }
    }

    /// Integrate one operation, local or remote.
    pub(crate) fn integrate(&mut self, op: &Op, event: &mut TransactionEvent) -> Integration {
        let expected = self.state.get(&op.id.client);
        if op.id.clock < expected {
            return Integration::Duplicate;
        }
        if op.id.clock > expected || !self.dependencies_met(op) {
            return Integration::Blocked;
        }
        self.clock.observe(op.time);
        self.state.advance(op.id.client, op.id.clock + 1);
        let stamp = Stamp {
            time: op.time,
            client: op.id.client,
        };
        match &op.kind {
            OpKind::Insert { parent, left_origin, right_origin, content } => {
                self.integrate_insert(op.id, stamp, parent, *left_origin, *right_origin, content, event);
            }
            OpKind::Delete { targets } => self.integrate_delete(op.id, targets, event),
            OpKind::SetAttr { target, key, value } => {
                self.integrate_set_attr(stamp, target, key, value, event);
            }
            OpKind::Format { targets, key, value } => {
                self.integrate_format(stamp, targets, key, value, event);
            }
        }
        self.log.push(op.clone());
        event.ops += 1;
        return Integration::Applied;
    }

    #[allow(clippy::too_many_arguments)]
    fn integrate_insert(
        &mut self,
        id: StructId,
        stamp: Stamp,
        parent: &BranchId,
        left_origin: Option<StructId>,
        right_origin: Option<StructId>,
        content: &OpContent,
        event: &mut TransactionEvent,
    ) {
        if let BranchId::Item(parent_id) = parent {
            if self.collected.contains(parent_id) || !self.branches.contains_key(parent) {
                self.collected.insert(id);
                return;
            }
        }
        if let BranchId::Root(name) = parent {
            self.ensure_root(name);
        }
        let Some(parent_kind) = self.branches.get(parent).map(|b| b.kind) else {
            return;
        };
        let (item_content, embedded) = match content {
            OpContent::Char { ch, formats } => {
                if parent_kind != BranchKind::Text {
                    warn!(?id, ?parent, "dropping character inserted into a non-text branch");
                    return;
                }
                let formats = formats
                    .iter()
                    .map(|(key, value)| (key.clone(), Lww { value: Some(value.clone()), stamp }))
                    .collect();
                (Content::Char { ch: *ch, formats }, None)
            }
            OpContent::Element { name } => (Content::Embed(BranchKind::Element), Some(Branch::new(BranchKind::Element, Some(name.clone())))),
            OpContent::Text => (Content::Embed(BranchKind::Text), Some(Branch::new(BranchKind::Text, None))),
            OpContent::Hook { name } => (Content::Embed(BranchKind::Hook), Some(Branch::new(BranchKind::Hook, Some(name.clone())))),
        };
        if embedded.is_some() && !parent_kind.is_container() {
            warn!(?id, ?parent, "dropping node embedded into a text or hook branch");
            return;
        }

        // Content inserted into an already deleted branch is born deleted.
        let deletions = match parent.item().and_then(|pid| self.items.get(&pid)) {
            Some(parent_item) => parent_item.deletions.clone(),
            None => SmallVec::new(),
        };
        let born_deleted = !deletions.is_empty();
        let item = Item {
            id,
            parent: parent.clone(),
            left_origin,
            right_origin,
            content: item_content,
            deletions,
            redone: None,
        };
        let index = self.find_insert_index(&item);
        if let Some(branch) = self.branches.get_mut(parent) {
            branch.children.insert(index, id);
        }
        if let Some(branch) = embedded {
            self.branches.insert(BranchId::Item(id), branch);
        }
        self.items.insert(id, item);
        event.inserted.push(id);
        if !born_deleted {
            event.changed.insert(parent.clone());
        }
    }

    /// Find where a new item goes among its siblings (YATA).
    ///
    /// Scans the items between the left and right origin. Items that share our
    /// left origin are ordered by client id; items whose origin lies inside the
    /// scanned range belong to a subtree we must skip over.
    fn find_insert_index(&self, item: &Item) -> usize {
        let Some(branch) = self.branches.get(&item.parent) else {
            return 0;
        };
        let children = &branch.children;
        let position = |id: &StructId| children.iter().position(|c| c == id);
        let start = match item.left_origin {
            Some(origin) => position(&origin).map_or(0, |i| i + 1),
            None => 0,
        };
        let end = match item.right_origin {
            Some(origin) => position(&origin).unwrap_or(children.len()),
            None => children.len(),
        };

        let mut insert_at = start;
        let mut before_origin: FxHashSet<StructId> = FxHashSet::default();
        let mut conflicting: FxHashSet<StructId> = FxHashSet::default();
        let mut scan = start;
        while scan < end {
            let Some(other) = self.items.get(&children[scan]) else {
                break;
            };
            before_origin.insert(other.id);
            conflicting.insert(other.id);
            if other.left_origin == item.left_origin {
                if other.id.client < item.id.client {
                    insert_at = scan + 1;
                    conflicting.clear();
                } else if other.right_origin == item.right_origin {
                    break;
                }
            } else if other.left_origin.map_or(false, |o| before_origin.contains(&o)) {
                if !other.left_origin.map_or(false, |o| conflicting.contains(&o)) {
                    insert_at = scan + 1;
                    conflicting.clear();
                }
            } else {
                break;
            }
            scan += 1;
        }
        return insert_at;
    }

    fn integrate_delete(&mut self, op_id: StructId, targets: &[StructId], event: &mut TransactionEvent) {
        for target in targets {
            let Some(item) = self.items.get_mut(target) else {
                continue;
            };
            let was_deleted = item.is_deleted();
            if !item.deletions.contains(&op_id) {
                item.deletions.push(op_id);
            }
            if was_deleted {
                continue;
            }
            let parent = item.parent.clone();
            let embedded = item.embed_kind().is_some();
            event.deleted_items.push(*target);
            event.changed.insert(parent);
            if embedded {
                self.cascade_delete(BranchId::Item(*target), op_id, event);
            }
        }
        event.delete_ops.push(op_id);
    }

    /// Tombstone everything still alive below a deleted branch.
    fn cascade_delete(&mut self, root: BranchId, op_id: StructId, event: &mut TransactionEvent) {
        let mut stack = vec![root];
        while let Some(branch) = stack.pop() {
            event.deleted.insert(branch.clone());
            let children = match self.branches.get(&branch) {
                Some(b) => b.children.clone(),
                None => continue,
            };
            for child in children {
                let Some(item) = self.items.get_mut(&child) else {
                    continue;
                };
                if item.is_deleted() {
                    continue;
                }
                item.deletions.push(op_id);
                event.deleted_items.push(child);
                if item.embed_kind().is_some() {
                    stack.push(BranchId::Item(child));
                }
            }
        }
    }

    fn integrate_set_attr(
        &mut self,
        stamp: Stamp,
        target: &BranchId,
        key: &str,
        value: &Option<Value>,
        event: &mut TransactionEvent,
    ) {
        if let BranchId::Root(name) = target {
            self.ensure_root(name);
        }
        let Some(branch) = self.branches.get_mut(target) else {
            return;
        };
        let newer = branch.attrs.get(key).map_or(true, |entry| stamp > entry.stamp);
        if !newer {
            return;
        }
        branch.attrs.insert(key.to_string(), Lww { value: value.clone(), stamp });
        event.changed.insert(target.clone());
    }

    fn integrate_format(
        &mut self,
        stamp: Stamp,
        targets: &[StructId],
        key: &str,
        value: &Option<Value>,
        event: &mut TransactionEvent,
    ) {
        for target in targets {
            let Some(item) = self.items.get_mut(target) else {
                continue;
            };
            let deleted = item.is_deleted();
            let parent = item.parent.clone();
            let Content::Char { formats, .. } = &mut item.content else {
                continue;
            };
            let newer = formats.get(key).map_or(true, |entry| stamp > entry.stamp);
            if !newer {
                continue;
            }
            formats.insert(key.to_string(), Lww { value: value.clone(), stamp });
            if !deleted {
                event.changed.insert(parent);
            }
        }
    }

    // =========================================================================
    // Garbage collection
    // =========================================================================

    /// Drop the content of deleted branches. Returns the number of items
    /// collected. Does nothing when the replica was created with `gc = false`.
    pub fn collect_garbage(&mut self) -> usize {
        if !self.options.gc {
            return 0;
        }
        let mut targets: Vec<StructId> = self
            .items
            .values()
            .filter(|item| item.is_deleted() && item.embed_kind().is_some())
            .map(|item| item.id)
            .collect();
        targets.sort();

        let mut collected = 0;
        for target in targets {
            if !self.items.contains_key(&target) {
                continue;
            }
            let root = BranchId::Item(target);
            let mut stack = match self.branches.get_mut(&root) {
                Some(branch) if !branch.collected => {
                    branch.collected = true;
                    std::mem::take(&mut branch.children)
                }
                _ => continue,
            };
            while let Some(child) = stack.pop() {
                let Some(item) = self.items.remove(&child) else {
                    continue;
                };
                self.collected.insert(child);
                collected += 1;
                if item.embed_kind().is_some() {
                    if let Some(branch) = self.branches.remove(&BranchId::Item(child)) {
                        stack.extend(branch.children);
                    }
                }
            }
        }
        debug!(collected, "garbage collected");
        return collected;
    }
}

/// Append a character to a run list, extending the last run when the
/// formats and attribution match.
pub(crate) fn push_char(runs: &mut Vec<Run>, ch: char, attributes: Attrs, change: Option<YChange>) {
    if let Some(last) = runs.last_mut() {
        if last.attributes == attributes && last.change == change {
            last.insert.push(ch);
            return;
        }
    }
    runs.push(Run {
        insert: ch.to_string(),
        attributes,
        change,
    });
}
