// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Editor to shared tree patching.
//!
//! `update_fragment` reconciles a shared branch with an editor node so the
//! branch materializes to the node's content. Children that already match
//! at either end are kept untouched. The unresolved middle is walked from
//! both ends: text is diffed in place, same-named elements are recursed
//! into, and anything else is replaced by a freshly built shared node.
//!
//! Every write goes through the caller's transaction, so the whole patch
//! commits atomically under whatever origin the caller chose.

use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::trace;

use crate::Attrs;
use crate::Error;
use crate::Result;
use crate::crdt::BranchId;
use crate::crdt::BranchKind;
use crate::crdt::Transaction;
use crate::editor::Node;
use crate::editor::SYNC_MARKER;
use super::equality::Span;
use super::equality::child_match;
use super::equality::identity_matches;
use super::equality::mark_value;
use super::equality::nodes_equal;
use super::equality::normalize_children;
use super::equality::text_equal;
use super::mapping::Mapped;
use super::mapping::Mapping;

// =============================================================================
// String diff
// =============================================================================

/// A single splice turning one string into another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diff {
    /// Character index where the strings first differ.
    pub index: usize,
    /// Characters to remove at `index`.
    pub remove: usize,
    /// Text to insert at `index` after removing.
    pub insert: String,
}

/// Strip the common prefix and suffix of two strings, returning the splice
/// that remains. Indices are in characters.
pub fn simple_diff(a: &str, b: &str) -> Diff {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut left = 0;
    while left < a.len() && left < b.len() && a[left] == b[left] {
        left += 1;
    }
    let mut right = 0;
    while right + left < a.len() && right + left < b.len() && a[a.len() - right - 1] == b[b.len() - right - 1] {
        right += 1;
    }
    return Diff {
        index: left,
        remove: a.len() - left - right,
        insert: b[left..b.len() - right].iter().collect(),
    };
}

// =============================================================================
// Builders
// =============================================================================

/// The text formats an editor run is stored with.
pub fn run_formats(node: &Node) -> Attrs {
    let mut formats = Attrs::new();
    for mark in node.marks() {
        if mark.name != SYNC_MARKER {
            formats.insert(mark.name.clone(), mark_value(mark));
        }
    }
    return formats;
}

fn insert_runs(txn: &mut Transaction, text: &BranchId, index: usize, runs: &[Rc<Node>]) -> Result<()> {
    let mut at = index;
    for run in runs {
        let s = run.text_str().unwrap_or_default();
        txn.text_insert(text, at, s, &run_formats(run))?;
        at += s.chars().count();
    }
    return Ok(());
}

fn build(txn: &mut Transaction, parent: &BranchId, index: usize, span: &Span, mapping: &mut Mapping, depth: usize) -> Result<()> {
    if depth > crate::MAX_DEPTH {
        return Err(Error::TooDeep(depth));
    }
    match span {
        Span::Text(runs) => {
            let text = txn.insert_text(parent, index)?;
            insert_runs(txn, &text, 0, runs)?;
            mapping.insert(&text, Mapped::Text(runs.clone()));
        }
        Span::Element(node) => {
            let element = txn.insert_element(parent, index, node.name())?;
            if let Some(attrs) = node.attrs() {
                for (key, value) in attrs {
                    if key != SYNC_MARKER && !value.is_null() {
                        txn.set_attribute(&element, key, value.clone())?;
                    }
                }
            }
            for (i, child) in normalize_children(node).iter().enumerate() {
                build(txn, &element, i, child, mapping, depth + 1)?;
            }
            mapping.insert(&element, Mapped::Element(node.clone()));
        }
    }
    return Ok(());
}

// =============================================================================
// Text
// =============================================================================

/// Make a shared text branch hold exactly `runs`, keeping its identity and
/// the identity of every character the edit does not touch.
fn update_text(txn: &mut Transaction, text: &BranchId, runs: &[Rc<Node>], mapping: &mut Mapping) -> Result<()> {
    mapping.insert(text, Mapped::Text(runs.to_vec()));
    let delta = txn.doc().text_delta(text);
    let current: String = delta.iter().map(|run| run.insert.as_str()).collect();
    let mut stale: BTreeSet<String> = delta.iter().flat_map(|run| run.attributes.keys().cloned()).collect();
    let wanted: String = runs.iter().map(|run| run.text_str().unwrap_or_default()).collect();

    let diff = simple_diff(&current, &wanted);
    trace!(index = diff.index, remove = diff.remove, insert = diff.insert.len(), "text diff");
    if diff.remove > 0 {
        txn.text_delete(text, diff.index, diff.remove)?;
    }

    // Inserted characters take the formats of the run they land in.
    let insert_end = diff.index + diff.insert.chars().count();
    let mut start = 0;
    for run in runs {
        let s = run.text_str().unwrap_or_default();
        let end = start + s.chars().count();
        let from = start.max(diff.index);
        let to = end.min(insert_end);
        if from < to {
            let piece: String = s.chars().skip(from - start).take(to - from).collect();
            txn.text_insert(text, from, &piece, &run_formats(run))?;
        }
        start = end;
    }

    let mut offset = 0;
    for run in runs {
        let len = run.text_str().unwrap_or_default().chars().count();
        let formats = run_formats(run);
        stale.extend(formats.keys().cloned());
        for key in &stale {
            txn.text_format(text, offset, len, key, formats.get(key).cloned())?;
        }
        offset += len;
    }
    return Ok(());
}

// =============================================================================
// Fragments
// =============================================================================

fn reconcile_attributes(txn: &mut Transaction, shared: &BranchId, node: &Node) -> Result<()> {
    let wanted = node.attrs().cloned().unwrap_or_default();
    for (key, value) in &wanted {
        if key == SYNC_MARKER {
            continue;
        }
        if value.is_null() {
            txn.remove_attribute(shared, key)?;
        } else {
            txn.set_attribute(shared, key, value.clone())?;
        }
    }
    let existing: Vec<String> = txn.doc().attributes(shared).into_keys().collect();
    for key in existing {
        if !wanted.contains_key(&key) {
            txn.remove_attribute(shared, &key)?;
        }
    }
    return Ok(());
}

/// Whether a shared child can be patched into the given span by recursion.
fn same_element(txn: &Transaction, shared: &BranchId, span: &Span) -> bool {
    let Span::Element(node) = span else {
        return false;
    };
    let doc = txn.doc();
    return doc.kind(shared) == Some(BranchKind::Element) && doc.name(shared) == Some(node.name());
}

/// Reconcile `shared` with `editor` so the branch materializes to the
/// editor node's content.
///
/// Fails with `Error::TypeMismatch` when `shared` is an element of a
/// different type than `editor`.
pub fn update_fragment(txn: &mut Transaction, shared: &BranchId, editor: &Rc<Node>, mapping: &mut Mapping) -> Result<()> {
    return update_at(txn, shared, editor, mapping, 0);
}

fn update_at(txn: &mut Transaction, shared: &BranchId, editor: &Rc<Node>, mapping: &mut Mapping, depth: usize) -> Result<()> {
    if depth > crate::MAX_DEPTH {
        return Err(Error::TooDeep(depth));
    }
    match txn.doc().kind(shared) {
        Some(BranchKind::Fragment) => {}
        Some(BranchKind::Element) => {
            let found = txn.doc().name(shared).unwrap_or_default();
            if found != editor.name() {
                return Err(Error::TypeMismatch {
                    expected: editor.name().to_string(),
                    found: found.to_string(),
                });
            }
            reconcile_attributes(txn, shared, editor)?;
        }
        Some(other) => {
            return Err(Error::TypeMismatch {
                expected: editor.name().to_string(),
                found: format!("{:?}", other),
            });
        }
        None => return Err(Error::UnknownBranch(shared.clone())),
    }
    mapping.insert(shared, Mapped::Element(editor.clone()));

    let spans = normalize_children(editor);
    let children = txn.doc().children(shared);
    let min = spans.len().min(children.len());

    let mut left = 0;
    let mut right = 0;
    while left < min {
        if !identity_matches(mapping.get(&children[left]), &spans[left]) {
            if !nodes_equal(txn.doc(), &children[left], &spans[left]) {
                break;
            }
            remap(mapping, &children[left], &spans[left]);
        }
        left += 1;
    }
    while right + left + 1 < min {
        let child = &children[children.len() - right - 1];
        let span = &spans[spans.len() - right - 1];
        if !identity_matches(mapping.get(child), span) {
            if !nodes_equal(txn.doc(), child, span) {
                break;
            }
            remap(mapping, child, span);
        }
        right += 1;
    }

    while children.len() - left - right > 0 && spans.len() - left - right > 0 {
        let left_child = &children[left];
        let left_span = &spans[left];
        let is_text = txn.doc().kind(left_child) == Some(BranchKind::Text);
        if let (true, Span::Text(runs)) = (is_text, left_span) {
            if !text_equal(txn.doc(), left_child, runs) {
                update_text(txn, left_child, runs, mapping)?;
            }
            left += 1;
            continue;
        }

        let right_child = &children[children.len() - right - 1];
        let right_span = &spans[spans.len() - right - 1];
        let mut update_left = same_element(txn, left_child, left_span);
        let mut update_right = same_element(txn, right_child, right_span);
        if let (true, true, Span::Element(l), Span::Element(r)) = (update_left, update_right, left_span, right_span) {
            let on_left = child_match(txn.doc(), left_child, l, mapping);
            let on_right = child_match(txn.doc(), right_child, r, mapping);
            if on_left.saw_identity_hit && !on_right.saw_identity_hit {
                update_right = false;
            } else if !on_left.saw_identity_hit && on_right.saw_identity_hit {
                update_left = false;
            } else if on_left.matched > on_right.matched {
                update_right = false;
            } else {
                update_left = false;
            }
        }

        match (update_left, update_right, left_span, right_span) {
            (true, _, Span::Element(node), _) => {
                update_at(txn, left_child, node, mapping, depth + 1)?;
                left += 1;
            }
            (_, true, _, Span::Element(node)) => {
                update_at(txn, right_child, node, mapping, depth + 1)?;
                right += 1;
            }
            _ => {
                trace!(index = left, "replacing shared child");
                mapping.remove(left_child);
                txn.remove_range(shared, left, 1)?;
                build(txn, shared, left, left_span, mapping, depth + 1)?;
                left += 1;
            }
        }
    }

    let remaining = children.len() - left - right;
    let lone_text = children.len() == 1 && spans.is_empty() && txn.doc().kind(&children[0]) == Some(BranchKind::Text);
    if lone_text {
        mapping.remove(&children[0]);
        let len = txn.doc().len(&children[0]);
        txn.text_delete(&children[0], 0, len)?;
    } else if remaining > 0 {
        for child in &children[left..left + remaining] {
            mapping.remove(child);
        }
        txn.remove_range(shared, left, remaining)?;
    }

    for (offset, span) in spans[left..spans.len() - right].iter().enumerate() {
        build(txn, shared, left + offset, span, mapping, depth + 1)?;
    }
    return Ok(());
}

fn remap(mapping: &mut Mapping, shared: &BranchId, span: &Span) {
    let mapped = match span {
        Span::Element(node) => Mapped::Element(node.clone()),
        Span::Text(runs) => Mapped::Text(runs.clone()),
    };
    mapping.insert(shared, mapped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use crate::crdt::ClientId;
    use crate::crdt::Doc;
    use crate::editor::Mark;

    fn para(text: &str) -> Rc<Node> {
        let content = if text.is_empty() { vec![] } else { vec![Node::text(text, vec![])] };
        return Node::element("paragraph", Attrs::new(), content);
    }

    fn document(content: Vec<Rc<Node>>) -> Rc<Node> {
        return Node::element("doc", Attrs::new(), content);
    }

    fn patch(doc: &mut Doc, editor: &Rc<Node>, mapping: &mut Mapping) -> BranchId {
        let root = doc.get_or_insert_fragment("prosemirror");
        doc.transact(None, |txn| update_fragment(txn, &root, editor, mapping)).unwrap();
        return root;
    }

    #[test]
    fn diff_strips_common_ends() {
        assert_eq!(simple_diff("abc", "abxc"), Diff { index: 2, remove: 0, insert: "x".to_string() });
        assert_eq!(simple_diff("hello", "help"), Diff { index: 3, remove: 2, insert: "p".to_string() });
        assert_eq!(simple_diff("aaa", "aa"), Diff { index: 2, remove: 1, insert: String::new() });
        assert_eq!(simple_diff("", "héé"), Diff { index: 0, remove: 0, insert: "héé".to_string() });
    }

    #[test]
    fn patch_builds_structure() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut attrs = Attrs::new();
        attrs.insert("level".to_string(), Value::from(2));
        let editor = document(vec![
            Node::element("heading", attrs, vec![Node::text("Title", vec![])]),
            Node::element(
                "paragraph",
                Attrs::new(),
                vec![Node::text("a", vec![]), Node::text("b", vec![Mark::new("bold")])],
            ),
        ]);
        let root = patch(&mut doc, &editor, &mut Mapping::new());
        assert_eq!(doc.to_xml(&root), "<heading level=2>Title</heading><paragraph>ab</paragraph>");
        let para = doc.children(&root)[1].clone();
        let text = doc.children(&para)[0].clone();
        assert_eq!(doc.text_delta(&text).len(), 2);
    }

    #[test]
    fn second_patch_is_a_no_op() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut mapping = Mapping::new();
        let editor = document(vec![para("123"), para("456")]);
        patch(&mut doc, &editor, &mut mapping);
        let before = doc.state_vector();
        patch(&mut doc, &editor, &mut mapping);
        assert_eq!(doc.state_vector(), before);

        // Structurally equal but freshly allocated nodes are also a no-op.
        patch(&mut doc, &document(vec![para("123"), para("456")]), &mut Mapping::new());
        assert_eq!(doc.state_vector(), before);
    }

    #[test]
    fn text_edits_keep_identities() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut mapping = Mapping::new();
        let root = patch(&mut doc, &document(vec![para("one"), para("two")]), &mut mapping);
        let children = doc.children(&root);
        let first_text = doc.children(&children[0])[0].clone();

        patch(&mut doc, &document(vec![para("once"), para("two")]), &mut mapping);
        assert_eq!(doc.children(&root), children);
        assert_eq!(doc.children(&children[0])[0], first_text);
        assert_eq!(doc.text(&first_text), "once");
    }

    #[test]
    fn formats_follow_marks() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut mapping = Mapping::new();
        let root = patch(&mut doc, &document(vec![para("abcd")]), &mut mapping);
        let bold = document(vec![Node::element(
            "paragraph",
            Attrs::new(),
            vec![Node::text("ab", vec![]), Node::text("cd", vec![Mark::new("bold")])],
        )]);
        patch(&mut doc, &bold, &mut mapping);
        let first = doc.children(&root)[0].clone();
        let text = doc.children(&first)[0].clone();
        let delta = doc.text_delta(&text);
        assert_eq!(delta.len(), 2);
        assert!(delta[1].attributes.contains_key("bold"));

        patch(&mut doc, &document(vec![para("abcd")]), &mut mapping);
        assert_eq!(doc.text_delta(&text).len(), 1);
    }

    #[test]
    fn attributes_are_reconciled() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut mapping = Mapping::new();
        let mut attrs = Attrs::new();
        attrs.insert("align".to_string(), Value::from("left"));
        attrs.insert("ychange".to_string(), Value::from("ignored"));
        let root = patch(&mut doc, &document(vec![Node::element("paragraph", attrs, vec![])]), &mut mapping);
        let para = doc.children(&root)[0].clone();
        assert_eq!(doc.attributes(&para).len(), 1);

        let mut attrs = Attrs::new();
        attrs.insert("align".to_string(), Value::Null);
        patch(&mut doc, &document(vec![Node::element("paragraph", attrs, vec![])]), &mut mapping);
        assert!(doc.attributes(&para).is_empty());
        assert_eq!(doc.children(&root), vec![para]);
    }

    #[test]
    fn lone_text_is_cleared_not_deleted() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut mapping = Mapping::new();
        let root = patch(&mut doc, &document(vec![para("abc")]), &mut mapping);
        let p = doc.children(&root)[0].clone();
        let text = doc.children(&p)[0].clone();
        patch(&mut doc, &document(vec![para("")]), &mut mapping);
        assert_eq!(doc.children(&p), vec![text.clone()]);
        assert_eq!(doc.text(&text), "");
    }

    #[test]
    fn mismatched_elements_are_replaced() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut mapping = Mapping::new();
        let root = patch(&mut doc, &document(vec![para("x")]), &mut mapping);
        let old = doc.children(&root)[0].clone();
        let quote = Node::element("blockquote", Attrs::new(), vec![para("x")]);
        patch(&mut doc, &document(vec![quote]), &mut mapping);
        let children = doc.children(&root);
        assert_eq!(children.len(), 1);
        assert_ne!(children[0], old);
        assert!(doc.is_deleted(&old));
        assert_eq!(doc.to_xml(&root), "<blockquote><paragraph>x</paragraph></blockquote>");
    }

    #[test]
    fn root_type_mismatch_is_an_error() {
        let mut doc = Doc::with_client(ClientId(1));
        let root = doc.get_or_insert_fragment("prosemirror");
        let para = doc.transact(None, |txn| txn.insert_element(&root, 0, "paragraph")).unwrap();
        let result = doc.transact(None, |txn| update_fragment(txn, &para, &Node::element("heading", Attrs::new(), vec![]), &mut Mapping::new()));
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn inserts_and_deletes_in_the_middle() {
        let mut doc = Doc::with_client(ClientId(1));
        let mut mapping = Mapping::new();
        let root = patch(&mut doc, &document(vec![para("a"), para("b"), para("c")]), &mut mapping);
        let before = doc.children(&root);
        patch(&mut doc, &document(vec![para("a"), para("c")]), &mut mapping);
        let after = doc.children(&root);
        assert_eq!(after, vec![before[0].clone(), before[2].clone()]);

        patch(&mut doc, &document(vec![para("a"), para("new"), para("c")]), &mut mapping);
        assert_eq!(doc.to_xml(&root), "<paragraph>a</paragraph><paragraph>new</paragraph><paragraph>c</paragraph>");
        let last = doc.children(&root);
        assert_eq!(last[0], before[0]);
        assert_eq!(last[2], before[2]);
    }
}
