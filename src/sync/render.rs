// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Shared tree to editor rendering.
//!
//! A `Renderer` materializes the children of a shared fragment as editor
//! nodes, validated against the editor's schema. It runs in one of two
//! modes:
//!
//! - current: renders the live tree, reusing whatever the mapping still
//!   holds. Clearing the mapping first gives a full rebuild; invalidating
//!   it from a transaction event gives an incremental one.
//! - diff: renders everything visible under either of two snapshots and
//!   marks content visible in only one of them with a `ychange`
//!   attribution.
//!
//! A shared node the schema rejects renders as absent. In current mode the
//! renderer also queues a `Repair` deleting it, which the caller applies in
//! a follow-up transaction since rendering only reads the document.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::debug;
use tracing::warn;

use crate::Attrs;
use crate::Error;
use crate::Result;
use crate::Value;
use crate::crdt::BranchId;
use crate::crdt::BranchKind;
use crate::crdt::ClientId;
use crate::crdt::Doc;
use crate::crdt::Run;
use crate::crdt::Snapshot;
use crate::crdt::StructId;
use crate::crdt::YChange;
use crate::editor::Node;
use crate::editor::SYNC_MARKER;
use crate::editor::Schema;
use super::equality::mark_attrs;
use super::mapping::Mapped;
use super::mapping::Mapping;

// =============================================================================
// Users
// =============================================================================

/// Display information for the author of a change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    /// A CSS colour, e.g. `#30bced`.
    pub color: String,
}

/// Resolves the replica that made a change to a displayable user.
pub trait UserLookup {
    fn resolve(&self, client: ClientId) -> Option<UserInfo>;
}

/// Names users by their client id and derives a stable colour from it.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultUsers;

impl UserLookup for DefaultUsers {
    fn resolve(&self, client: ClientId) -> Option<UserInfo> {
        let digest = crate::key::hash(&client.0.to_le_bytes());
        let color = format!("#{:02x}{:02x}{:02x}", digest.0[0], digest.0[1], digest.0[2]);
        return Some(UserInfo { name: client.to_string(), color });
    }
}

/// The `ychange` attribute or mark value for an attributed change.
pub fn change_attrs(change: &YChange, users: &dyn UserLookup) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert("kind".to_string(), Value::from(change.kind.as_str()));
    match users.resolve(change.client) {
        Some(info) => {
            attrs.insert("user".to_string(), Value::from(info.name));
            attrs.insert("color".to_string(), Value::from(info.color));
        }
        None => {
            attrs.insert("user".to_string(), Value::from(change.client.to_string()));
        }
    }
    return attrs;
}

// =============================================================================
// Repairs
// =============================================================================

/// A write the renderer needs applied to the shared tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Repair {
    /// Delete a node the schema rejected.
    Delete(StructId),
    /// Move the content of `from` to the end of `into`, then delete `from`.
    /// Queued for adjacent text branches this replica created.
    MergeText { into: BranchId, from: BranchId },
}

/// Apply queued repairs inside a transaction.
pub fn apply_repairs(txn: &mut crate::crdt::Transaction, repairs: &[Repair]) -> Result<()> {
    for repair in repairs {
        match repair {
            Repair::Delete(id) => txn.delete_branch(&BranchId::Item(*id))?,
            Repair::MergeText { into, from } => {
                if txn.doc().is_deleted(from) || txn.doc().is_deleted(into) {
                    continue;
                }
                let runs = txn.doc().text_delta(from);
                let mut at = txn.doc().len(into);
                for run in runs {
                    txn.text_insert(into, at, &run.insert, &run.attributes)?;
                    at += run.insert.chars().count();
                }
                txn.delete_branch(from)?;
            }
        }
    }
    return Ok(());
}

// =============================================================================
// Renderer
// =============================================================================

struct Diff<'a> {
    snapshot: &'a Snapshot,
    prev: &'a Snapshot,
    users: &'a dyn UserLookup,
}

/// Materializes shared branches as editor nodes.
pub struct Renderer<'a> {
    doc: &'a Doc,
    schema: &'a Schema,
    diff: Option<Diff<'a>>,
    repairs: Vec<Repair>,
    absorbed: FxHashSet<BranchId>,
}

impl<'a> Renderer<'a> {
    /// Render the current state of `doc`.
    pub fn new(doc: &'a Doc, schema: &'a Schema) -> Renderer<'a> {
        return Renderer {
            doc,
            schema,
            diff: None,
            repairs: Vec::new(),
            absorbed: FxHashSet::default(),
        };
    }

    /// Render the difference between `prev` and `snapshot`.
    ///
    /// Pass an empty mapping to `render`: entries made in diff mode hold
    /// attribution marks and must not leak into live rendering.
    pub fn with_snapshot(
        doc: &'a Doc,
        schema: &'a Schema,
        snapshot: &'a Snapshot,
        prev: &'a Snapshot,
        users: &'a dyn UserLookup,
    ) -> Renderer<'a> {
        let mut renderer = Renderer::new(doc, schema);
        renderer.diff = Some(Diff { snapshot, prev, users });
        return renderer;
    }

    pub fn repairs(&self) -> &[Repair] {
        return &self.repairs;
    }

    pub fn into_repairs(self) -> Vec<Repair> {
        return self.repairs;
    }

    /// Render the children of `fragment` as editor document content.
    pub fn render(&mut self, fragment: &BranchId, mapping: &mut Mapping) -> Result<Vec<Rc<Node>>> {
        let content = self.render_children(fragment, mapping, 0)?;
        debug!(
            nodes = content.len(),
            mapped = mapping.len(),
            repairs = self.repairs.len(),
            "rendered fragment"
        );
        return Ok(content);
    }

    fn children_of(&self, branch: &BranchId) -> Vec<(BranchId, Option<YChange>)> {
        match &self.diff {
            Some(diff) => return self.doc.children_diff(branch, diff.snapshot, diff.prev),
            None => return self.doc.children(branch).into_iter().map(|child| (child, None)).collect(),
        }
    }

    fn render_children(&mut self, branch: &BranchId, mapping: &mut Mapping, depth: usize) -> Result<Vec<Rc<Node>>> {
        if depth > crate::MAX_DEPTH {
            return Err(Error::TooDeep(depth));
        }
        let mut content = Vec::new();
        for (child, change) in self.children_of(branch) {
            if self.absorbed.contains(&child) {
                continue;
            }
            match self.doc.kind(&child) {
                Some(BranchKind::Element) => {
                    if let Some(node) = self.render_element(&child, change, mapping, depth + 1)? {
                        content.push(node);
                    }
                }
                Some(BranchKind::Text) => {
                    if let Some(nodes) = self.render_text(&child, mapping) {
                        content.extend(nodes);
                    }
                }
                Some(BranchKind::Hook) => {
                    let name = self.doc.name(&child).unwrap_or_default();
                    return Err(Error::Unimplemented(format!("rendering hook {:?}", name)));
                }
                Some(BranchKind::Fragment) | None => {}
            }
        }
        return Ok(content);
    }

    fn reject(&mut self, branch: &BranchId, mapping: &mut Mapping, reason: &dyn std::fmt::Display) {
        warn!(?branch, %reason, "dropping shared node the schema rejects");
        mapping.remove(branch);
        if self.diff.is_none() {
            if let Some(id) = branch.item() {
                self.repairs.push(Repair::Delete(id));
            }
        }
    }

    fn render_element(
        &mut self,
        branch: &BranchId,
        change: Option<YChange>,
        mapping: &mut Mapping,
        depth: usize,
    ) -> Result<Option<Rc<Node>>> {
        if let Some(Mapped::Element(node)) = mapping.get(branch) {
            return Ok(Some(node.clone()));
        }
        let children = self.render_children(branch, mapping, depth)?;
        let mut attrs = self.doc.attributes(branch);
        if let (Some(change), Some(diff)) = (change, &self.diff) {
            attrs.insert(SYNC_MARKER.to_string(), change_value(&change, diff.users));
        }
        let name = self.doc.name(branch).unwrap_or_default();
        match self.schema.node(name, attrs, children) {
            Ok(node) => {
                mapping.insert(branch, Mapped::Element(node.clone()));
                return Ok(Some(node));
            }
            Err(err) => {
                self.reject(branch, mapping, &err);
                return Ok(None);
            }
        }
    }

    /// Text branches created by this replica that directly follow `text`.
    fn mergeable_followers(&self, text: &BranchId) -> Vec<BranchId> {
        let mut out = Vec::new();
        let Some(mut current) = text.item() else {
            return out;
        };
        let own = self.doc.client_id();
        while let Some(next) = self.doc.right_sibling(&current) {
            let branch = BranchId::Item(next);
            let own_text = next.client == own
                && self.doc.kind(&branch) == Some(BranchKind::Text)
                && !self.doc.is_deleted(&branch);
            if !own_text {
                break;
            }
            out.push(branch);
            current = next;
        }
        return out;
    }

    fn render_text(&mut self, text: &BranchId, mapping: &mut Mapping) -> Option<Vec<Rc<Node>>> {
        let mut runs: Vec<Run> = Vec::new();
        match &self.diff {
            Some(diff) => runs.extend(self.doc.text_delta_diff(text, diff.snapshot, diff.prev)),
            None => {
                let followers = self.mergeable_followers(text);
                if followers.is_empty() {
                    if let Some(Mapped::Text(nodes)) = mapping.get(text) {
                        return Some(nodes.clone());
                    }
                }
                runs.extend(self.doc.text_delta(text));
                for from in followers {
                    runs.extend(self.doc.text_delta(&from));
                    mapping.remove(&from);
                    self.absorbed.insert(from.clone());
                    self.repairs.push(Repair::MergeText { into: text.clone(), from });
                }
            }
        }

        let mut nodes: Vec<Rc<Node>> = Vec::with_capacity(runs.len());
        for run in &runs {
            match self.text_node(run) {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    self.reject(text, mapping, &err);
                    return None;
                }
            }
        }
        let nodes = crate::editor::normalize_content(nodes);
        mapping.insert(text, Mapped::Text(nodes.clone()));
        return Some(nodes);
    }

    fn text_node(&self, run: &Run) -> std::result::Result<Rc<Node>, crate::editor::SchemaError> {
        let mut marks = Vec::with_capacity(run.attributes.len() + 1);
        for (name, value) in &run.attributes {
            marks.push(self.schema.mark(name, mark_attrs(value))?);
        }
        if let (Some(change), Some(diff)) = (&run.change, &self.diff) {
            marks.push(self.schema.mark(SYNC_MARKER, change_attrs(change, diff.users))?);
        }
        return self.schema.text(&run.insert, marks);
    }
}

/// Render the live content of `fragment`, reusing `mapping`.
pub fn render_current(
    doc: &Doc,
    fragment: &BranchId,
    schema: &Schema,
    mapping: &mut Mapping,
) -> Result<(Vec<Rc<Node>>, Vec<Repair>)> {
    let mut renderer = Renderer::new(doc, schema);
    let content = renderer.render(fragment, mapping)?;
    return Ok((content, renderer.into_repairs()));
}

/// Render `fragment` as the difference between two snapshots.
pub fn render_diff(
    doc: &Doc,
    fragment: &BranchId,
    schema: &Schema,
    snapshot: &Snapshot,
    prev: &Snapshot,
    users: &dyn UserLookup,
) -> Result<Vec<Rc<Node>>> {
    let mut scratch = Mapping::new();
    let mut renderer = Renderer::with_snapshot(doc, schema, snapshot, prev, users);
    return renderer.render(fragment, &mut scratch);
}

/// `ychange` attrs as a JSON value, handy when comparing rendered output.
pub fn change_value(change: &YChange, users: &dyn UserLookup) -> Value {
    return Value::Object(change_attrs(change, users).into_iter().collect());
}
