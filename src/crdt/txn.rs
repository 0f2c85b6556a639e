// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Local mutation API.
//!
//! A `Transaction` borrows the replica mutably for the duration of a
//! `Doc::transact` call. Every method turns one edit into ops, integrates
//! them immediately (so later calls in the same transaction see the effect),
//! and accumulates a `TransactionEvent` that observers receive on commit.
//!
//! Indexes count visible units only: characters for text branches, embedded
//! children for containers.

use tracing::warn;

use crate::Attrs;
use crate::Value;
use crate::error::Error;
use crate::error::Result;
use super::doc::BranchKind;
use super::doc::Doc;
use super::doc::Integration;
use super::event::Origin;
use super::event::TransactionEvent;
use super::id::BranchId;
use super::id::StructId;
use super::update::Op;
use super::update::OpContent;
use super::update::OpKind;

/// An open transaction on a replica.
pub struct Transaction<'doc> {
    doc: &'doc mut Doc,
    event: TransactionEvent,
}

impl<'doc> Transaction<'doc> {
    pub(crate) fn new(doc: &'doc mut Doc, origin: Option<Origin>, local: bool) -> Transaction<'doc> {
        return Transaction {
            doc,
            event: TransactionEvent::new(origin, local),
        };
    }

    /// Read access to the replica as modified so far.
    pub fn doc(&self) -> &Doc {
        return &*self.doc;
    }

    pub(crate) fn doc_mut(&mut self) -> &mut Doc {
        return &mut *self.doc;
    }

    pub fn origin(&self) -> Option<&Origin> {
        return self.event.origin.as_ref();
    }

    /// Whether undo managers should record this transaction. Defaults to true.
    pub fn set_add_to_history(&mut self, add: bool) {
        self.event.add_to_history = add;
    }

    pub(crate) fn finish(self) -> TransactionEvent {
        let Transaction { doc, mut event } = self;
        doc.summarize(&mut event);
        return event;
    }

    /// Issue and integrate one local op.
    pub(crate) fn apply_local(&mut self, kind: OpKind) -> StructId {
        let client = self.doc.client_id();
        let id = StructId::new(client, self.doc.state.get(&client));
        let time = self.doc.clock.tick();
        let op = Op { id, time, kind };
        let outcome = self.doc.integrate(&op, &mut self.event);
        if outcome != Integration::Applied {
            warn!(?id, ?outcome, "local operation was not applied");
        }
        return id;
    }

    // =========================================================================
    // Validation helpers
    // =========================================================================

    fn expect_container(&mut self, parent: &BranchId) -> Result<()> {
        if let BranchId::Root(name) = parent {
            self.doc.ensure_root(name);
            return Ok(());
        }
        match self.doc.branch(parent) {
            Some(branch) if branch.collected => return Err(Error::UnknownBranch(parent.clone())),
            Some(branch) if branch.kind.is_container() => return Ok(()),
            Some(_) => return Err(Error::NotContainer(parent.clone())),
            None => return Err(Error::UnknownBranch(parent.clone())),
        }
    }

    fn expect_text(&self, text: &BranchId) -> Result<()> {
        match self.doc.branch(text) {
            Some(branch) if branch.kind == BranchKind::Text => return Ok(()),
            Some(_) => return Err(Error::NotText(text.clone())),
            None => return Err(Error::UnknownBranch(text.clone())),
        }
    }

    fn expect_exists(&mut self, branch: &BranchId) -> Result<()> {
        if let BranchId::Root(name) = branch {
            self.doc.ensure_root(name);
            return Ok(());
        }
        if !self.doc.exists(branch) {
            return Err(Error::UnknownBranch(branch.clone()));
        }
        return Ok(());
    }

    /// The origins for an insert at `index`: the `index`-th visible item
    /// and whatever raw item follows it, tombstones included.
    fn neighbours(&self, parent: &BranchId, index: usize) -> Result<(Option<StructId>, Option<StructId>)> {
        let children: &[StructId] = match self.doc.branch(parent) {
            Some(branch) => &branch.children,
            None => &[],
        };
        if index == 0 {
            return Ok((None, children.first().copied()));
        }
        let mut seen = 0;
        for (at, id) in children.iter().enumerate() {
            let visible = self.doc.item(id).map_or(false, |item| !item.is_deleted());
            if !visible {
                continue;
            }
            seen += 1;
            if seen == index {
                return Ok((Some(*id), children.get(at + 1).copied()));
            }
        }
        return Err(Error::IndexOutOfBounds { index, len: seen });
    }

    /// Ids of the visible items in `index..index + len`.
    fn visible_range(&self, branch: &BranchId, index: usize, len: usize) -> Result<Vec<StructId>> {
        let visible: Vec<StructId> = self.doc.visible_items(branch).map(|item| item.id).collect();
        let end = index + len;
        if end > visible.len() {
            return Err(Error::IndexOutOfBounds { index: end, len: visible.len() });
        }
        return Ok(visible[index..end].to_vec());
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn insert_embed(&mut self, parent: &BranchId, index: usize, content: OpContent) -> Result<BranchId> {
        self.expect_container(parent)?;
        let (left_origin, right_origin) = self.neighbours(parent, index)?;
        let id = self.apply_local(OpKind::Insert {
            parent: parent.clone(),
            left_origin,
            right_origin,
            content,
        });
        return Ok(BranchId::Item(id));
    }

    /// Insert an empty element named `name` at `index`.
    pub fn insert_element(&mut self, parent: &BranchId, index: usize, name: &str) -> Result<BranchId> {
        return self.insert_embed(parent, index, OpContent::Element { name: name.to_string() });
    }

    /// Insert an empty text branch at `index`.
    pub fn insert_text(&mut self, parent: &BranchId, index: usize) -> Result<BranchId> {
        return self.insert_embed(parent, index, OpContent::Text);
    }

    /// Insert an opaque hook node at `index`.
    pub fn insert_hook(&mut self, parent: &BranchId, index: usize, name: &str) -> Result<BranchId> {
        return self.insert_embed(parent, index, OpContent::Hook { name: name.to_string() });
    }

    /// Delete `len` embedded children starting at `index`.
    pub fn remove_range(&mut self, parent: &BranchId, index: usize, len: usize) -> Result<()> {
        self.expect_container(parent)?;
        let targets = self.visible_range(parent, index, len)?;
        self.delete_items(targets);
        return Ok(());
    }

    /// Delete the item embedding `branch`. Roots cannot be deleted.
    pub fn delete_branch(&mut self, branch: &BranchId) -> Result<()> {
        let Some(id) = branch.item() else {
            return Ok(());
        };
        match self.doc.item(&id) {
            Some(item) if item.is_deleted() => return Ok(()),
            Some(_) => {}
            None => return Err(Error::UnknownBranch(branch.clone())),
        }
        self.delete_items(vec![id]);
        return Ok(());
    }

    pub(crate) fn delete_items(&mut self, targets: Vec<StructId>) {
        if targets.is_empty() {
            return;
        }
        self.apply_local(OpKind::Delete { targets });
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Set an attribute. Writing the current value is a no-op.
    pub fn set_attribute(&mut self, branch: &BranchId, key: &str, value: Value) -> Result<()> {
        self.expect_exists(branch)?;
        if self.doc.attribute(branch, key) == Some(&value) {
            return Ok(());
        }
        self.apply_local(OpKind::SetAttr {
            target: branch.clone(),
            key: key.to_string(),
            value: Some(value),
        });
        return Ok(());
    }

    /// Remove an attribute. Removing an absent attribute is a no-op.
    pub fn remove_attribute(&mut self, branch: &BranchId, key: &str) -> Result<()> {
        self.expect_exists(branch)?;
        if self.doc.attribute(branch, key).is_none() {
            return Ok(());
        }
        self.apply_local(OpKind::SetAttr {
            target: branch.clone(),
            key: key.to_string(),
            value: None,
        });
        return Ok(());
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Insert `s` at character `index`, every character carrying `formats`.
    pub fn text_insert(&mut self, text: &BranchId, index: usize, s: &str, formats: &Attrs) -> Result<()> {
        self.expect_text(text)?;
        let (mut left_origin, right_origin) = self.neighbours(text, index)?;
        for ch in s.chars() {
            let id = self.apply_local(OpKind::Insert {
                parent: text.clone(),
                left_origin,
                right_origin,
                content: OpContent::Char {
                    ch,
                    formats: formats.clone(),
                },
            });
            left_origin = Some(id);
        }
        return Ok(());
    }

    /// Delete `len` characters starting at `index`.
    pub fn text_delete(&mut self, text: &BranchId, index: usize, len: usize) -> Result<()> {
        self.expect_text(text)?;
        let targets = self.visible_range(text, index, len)?;
        self.delete_items(targets);
        return Ok(());
    }

    /// Set (or with `None`, remove) one format over a character range.
    /// Characters that already carry the requested value are skipped.
    pub fn text_format(
        &mut self,
        text: &BranchId,
        index: usize,
        len: usize,
        key: &str,
        value: Option<Value>,
    ) -> Result<()> {
        self.expect_text(text)?;
        let range = self.visible_range(text, index, len)?;
        let targets: Vec<StructId> = range
            .into_iter()
            .filter(|id| {
                let current = self.doc.item(id).map(|item| item.formats().get(key).cloned());
                return current.flatten() != value;
            })
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        self.apply_local(OpKind::Format {
            targets,
            key: key.to_string(),
            value,
        });
        return Ok(());
    }
}

impl Doc {
    /// Fill in the derived parts of an event: ancestors of changed branches
    /// and the roots they hang from.
    pub(crate) fn summarize(&self, event: &mut TransactionEvent) {
        let changed: Vec<BranchId> = event.changed.iter().cloned().collect();
        for branch in changed {
            let mut current = branch;
            loop {
                if let BranchId::Root(name) = &current {
                    event.roots.insert(name.clone());
                    break;
                }
                let Some(parent) = self.parent(&current) else {
                    break;
                };
                if !event.changed_parents.insert(parent.clone()) && !parent.is_root() {
                    break;
                }
                current = parent;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::ClientId;

    fn doc() -> (Doc, BranchId) {
        let mut doc = Doc::with_client(ClientId(1));
        let root = doc.get_or_insert_fragment("doc");
        return (doc, root);
    }

    #[test]
    fn insert_out_of_bounds_fails() {
        let (mut doc, root) = doc();
        let result = doc.transact(None, |txn| txn.insert_element(&root, 1, "paragraph"));
        assert!(matches!(result, Err(Error::IndexOutOfBounds { index: 1, len: 0 })));
    }

    #[test]
    fn text_ops_require_text() {
        let (mut doc, root) = doc();
        let para = doc.transact(None, |txn| txn.insert_element(&root, 0, "paragraph")).unwrap();
        let result = doc.transact(None, |txn| txn.text_insert(&para, 0, "x", &Attrs::new()));
        assert!(matches!(result, Err(Error::NotText(_))));
    }

    #[test]
    fn embedding_into_text_fails() {
        let (mut doc, root) = doc();
        let text = doc.transact(None, |txn| txn.insert_text(&root, 0)).unwrap();
        let result = doc.transact(None, |txn| txn.insert_element(&text, 0, "paragraph"));
        assert!(matches!(result, Err(Error::NotContainer(_))));
    }

    #[test]
    fn redundant_writes_issue_no_ops() {
        let (mut doc, root) = doc();
        let para = doc.transact(None, |txn| txn.insert_element(&root, 0, "heading")).unwrap();
        doc.transact(None, |txn| txn.set_attribute(&para, "level", Value::from(1))).unwrap();
        let before = doc.state_vector();
        doc.transact(None, |txn| {
            txn.set_attribute(&para, "level", Value::from(1))?;
            txn.remove_attribute(&para, "missing")
        })
        .unwrap();
        assert_eq!(doc.state_vector(), before);
    }

    #[test]
    fn format_changes_only_differing_chars() {
        let (mut doc, root) = doc();
        let text = doc.transact(None, |txn| txn.insert_text(&root, 0)).unwrap();
        doc.transact(None, |txn| txn.text_insert(&text, 0, "abcd", &Attrs::new())).unwrap();
        doc.transact(None, |txn| txn.text_format(&text, 1, 2, "em", Some(Value::Bool(true)))).unwrap();
        let delta = doc.text_delta(&text);
        assert_eq!(delta.len(), 3);
        assert_eq!(delta[1].insert, "bc");

        let before = doc.state_vector();
        doc.transact(None, |txn| txn.text_format(&text, 1, 2, "em", Some(Value::Bool(true)))).unwrap();
        assert_eq!(doc.state_vector(), before);

        doc.transact(None, |txn| txn.text_format(&text, 0, 4, "em", None)).unwrap();
        assert_eq!(doc.text_delta(&text).len(), 1);
    }

    #[test]
    fn events_report_changes_and_roots() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let (mut doc, root) = doc();
        let text = doc
            .transact(None, |txn| {
                let para = txn.insert_element(&root, 0, "paragraph")?;
                txn.insert_text(&para, 0)
            })
            .unwrap();
        let seen: Rc<RefCell<Option<TransactionEvent>>> = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        doc.observe_deep(move |event| *sink.borrow_mut() = Some(event.clone()));
        doc.transact(Some(Origin::new("me")), |txn| txn.text_insert(&text, 0, "x", &Attrs::new())).unwrap();

        let event = seen.borrow_mut().take().unwrap();
        assert!(event.is_from(&Origin::new("me")));
        assert!(event.changed.contains(&text));
        assert!(event.changed_parents.contains(&root));
        assert!(event.touches("doc"));
    }
}
