// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Structural comparison between shared branches and editor nodes.
//!
//! The two trees disagree on how text is shaped: a shared text branch holds
//! any number of formatted runs, while the editor stores one node per run.
//! Editor content is therefore first grouped into `Span`s, where a span is
//! either one element or a maximal list of consecutive text nodes, and
//! spans are compared against shared children one to one.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::Attrs;
use crate::Value;
use crate::crdt::BranchId;
use crate::crdt::BranchKind;
use crate::crdt::Doc;
use crate::editor::Mark;
use crate::editor::Node;
use crate::editor::SYNC_MARKER;
use super::mapping::Mapped;
use super::mapping::Mapping;

/// One child of an editor node, grouped the way the shared tree stores it.
#[derive(Clone, Debug)]
pub enum Span {
    Element(Rc<Node>),
    Text(Vec<Rc<Node>>),
}

impl Span {
    pub fn size(&self) -> usize {
        match self {
            Span::Element(node) => return node.node_size(),
            Span::Text(nodes) => return nodes.iter().map(|n| n.node_size()).sum(),
        }
    }
}

/// Group the content of an editor node into spans.
pub fn normalize_children(node: &Node) -> Vec<Span> {
    let mut spans = Vec::new();
    for child in node.content() {
        if child.is_text() {
            if let Some(Span::Text(run)) = spans.last_mut() {
                run.push(child.clone());
                continue;
            }
            spans.push(Span::Text(vec![child.clone()]));
        } else {
            spans.push(Span::Element(child.clone()));
        }
    }
    return spans;
}

// =============================================================================
// Attributes
// =============================================================================

fn significant<'a, I>(entries: I) -> BTreeMap<&'a String, &'a Value>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    return entries
        .into_iter()
        .filter(|(key, value)| key.as_str() != SYNC_MARKER && !value.is_null())
        .collect();
}

fn entries_equal<'a, A, B>(a: A, b: B) -> bool
where
    A: IntoIterator<Item = (&'a String, &'a Value)>,
    B: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let a = significant(a);
    let b = significant(b);
    if a.len() != b.len() {
        return false;
    }
    return a.iter().all(|(key, left)| b.get(key).map_or(false, |right| values_equal(left, right)));
}

/// Compare attribute values. Objects are compared with `attrs_equal` rules.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Object(a), Value::Object(b)) => return entries_equal(a.iter(), b.iter()),
        (Value::Array(a), Value::Array(b)) => {
            return a.len() == b.len() && a.iter().zip(b.iter()).all(|(l, r)| values_equal(l, r));
        }
        _ => return left == right,
    }
}

/// Compare attribute maps, ignoring null values and the sync marker.
pub fn attrs_equal(a: &Attrs, b: &Attrs) -> bool {
    return entries_equal(a.iter(), b.iter());
}

/// The attributes a mark is stored with in a text format.
pub fn mark_value(mark: &Mark) -> Value {
    return Value::Object(mark.attrs.clone().into_iter().collect());
}

/// The mark attributes encoded by a text format value.
pub fn mark_attrs(value: &Value) -> Attrs {
    match value {
        Value::Object(map) => return map.clone().into_iter().collect(),
        _ => return Attrs::new(),
    }
}

fn marks_equal(formats: &Attrs, marks: &[Mark]) -> bool {
    let marks: Vec<&Mark> = marks.iter().filter(|m| m.name != SYNC_MARKER).collect();
    let formats = significant(formats.iter());
    if formats.len() != marks.len() {
        return false;
    }
    return marks.iter().all(|mark| match formats.get(&mark.name) {
        Some(value) => attrs_equal(&mark_attrs(value), &mark.attrs),
        None => false,
    });
}

// =============================================================================
// Nodes
// =============================================================================

/// Whether a shared text branch holds exactly the given editor runs.
pub fn text_equal(doc: &Doc, text: &BranchId, nodes: &[Rc<Node>]) -> bool {
    let delta = doc.text_delta(text);
    if delta.len() != nodes.len() {
        return false;
    }
    return delta.iter().zip(nodes.iter()).all(|(run, node)| {
        return node.text_str() == Some(run.insert.as_str()) && marks_equal(&run.attributes, node.marks());
    });
}

/// Whether a shared branch has the same content as an editor span.
pub fn nodes_equal(doc: &Doc, shared: &BranchId, editor: &Span) -> bool {
    return nodes_equal_at(doc, shared, editor, 0);
}

fn nodes_equal_at(doc: &Doc, shared: &BranchId, editor: &Span, depth: usize) -> bool {
    if depth > crate::MAX_DEPTH {
        return false;
    }
    match (doc.kind(shared), editor) {
        (Some(BranchKind::Text), Span::Text(nodes)) => return text_equal(doc, shared, nodes),
        (Some(BranchKind::Element), Span::Element(node)) => {
            if doc.name(shared) != Some(node.name()) || node.is_text() {
                return false;
            }
            let children = doc.children(shared);
            let spans = normalize_children(node);
            if children.len() != spans.len() {
                return false;
            }
            let attrs = node.attrs().cloned().unwrap_or_default();
            if !attrs_equal(&doc.attributes(shared), &attrs) {
                return false;
            }
            return children
                .iter()
                .zip(spans.iter())
                .all(|(child, span)| nodes_equal_at(doc, child, span, depth + 1));
        }
        _ => return false,
    }
}

/// Whether the registry already maps a branch to exactly this span:
/// the same element allocation, or the same list of text allocations.
pub fn identity_matches(mapped: Option<&Mapped>, editor: &Span) -> bool {
    match (mapped, editor) {
        (Some(Mapped::Element(a)), Span::Element(b)) => return Rc::ptr_eq(a, b),
        (Some(Mapped::Text(a)), Span::Text(b)) => {
            return a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| Rc::ptr_eq(x, y));
        }
        _ => return false,
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Result of scanning two child lists from both ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Match {
    /// Children matched at the front plus children matched at the back.
    pub matched: usize,
    /// Whether any match was confirmed by the registry rather than by
    /// structural comparison.
    pub saw_identity_hit: bool,
}

/// Count the equal children at the start and end of two child lists.
pub fn matching_prefix_suffix(doc: &Doc, shared: &[BranchId], editor: &[Span], mapping: &Mapping) -> Match {
    let min = shared.len().min(editor.len());
    let mut left = 0;
    let mut right = 0;
    let mut saw_identity_hit = false;
    while left < min {
        if identity_matches(mapping.get(&shared[left]), &editor[left]) {
            saw_identity_hit = true;
        } else if !nodes_equal(doc, &shared[left], &editor[left]) {
            break;
        }
        left += 1;
    }
    while left + right < min {
        let s = &shared[shared.len() - right - 1];
        let e = &editor[editor.len() - right - 1];
        if identity_matches(mapping.get(s), e) {
            saw_identity_hit = true;
        } else if !nodes_equal(doc, s, e) {
            break;
        }
        right += 1;
    }
    return Match { matched: left + right, saw_identity_hit };
}

/// `matching_prefix_suffix` applied to the children of a shared element and
/// an editor element.
pub fn child_match(doc: &Doc, shared: &BranchId, editor: &Rc<Node>, mapping: &Mapping) -> Match {
    let children = doc.children(shared);
    let spans = normalize_children(editor);
    return matching_prefix_suffix(doc, &children, &spans, mapping);
}
