// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Editor state, transactions, and the view that applies them.
//!
//! An `EditorState` is an immutable document plus a selection. Edits are
//! collected in a `Transaction` built from a state and applied through
//! `EditorView::dispatch`, which swaps in the resulting state. Every step
//! maps the selection forward so it keeps pointing at the same content.

use std::rc::Rc;

use crate::Value;
use crate::error::Error;
use crate::error::Result;
use super::node::Mark;
use super::node::Node;
use super::node::normalize_marks;
use super::schema::Schema;

// =============================================================================
// Selection
// =============================================================================

/// A selection between two document positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Selection {
        return Selection { anchor, head };
    }

    /// A collapsed selection.
    pub fn cursor(pos: usize) -> Selection {
        return Selection { anchor: pos, head: pos };
    }

    pub fn from(&self) -> usize {
        return self.anchor.min(self.head);
    }

    pub fn to(&self) -> usize {
        return self.anchor.max(self.head);
    }

    pub fn is_empty(&self) -> bool {
        return self.anchor == self.head;
    }

    fn map(self, step: &StepMap) -> Selection {
        return Selection { anchor: step.map(self.anchor), head: step.map(self.head) };
    }

    fn clamp(self, size: usize) -> Selection {
        return Selection { anchor: self.anchor.min(size), head: self.head.min(size) };
    }
}

/// How one replace step moved positions: `from..to` became `inserted` tokens.
#[derive(Clone, Copy, Debug)]
struct StepMap {
    from: usize,
    to: usize,
    inserted: usize,
}

impl StepMap {
    /// Map a position, sticking to the right of insertions.
    fn map(&self, pos: usize) -> usize {
        if pos < self.from {
            return pos;
        }
        if pos > self.to {
            return pos + self.inserted - (self.to - self.from);
        }
        if pos == self.from && self.from < self.to {
            return self.from;
        }
        return self.from + self.inserted;
    }
}

// =============================================================================
// Resolved positions
// =============================================================================

/// A position resolved against a document: the chain of ancestors it sits
/// in and its offset inside the innermost one.
#[derive(Clone, Debug)]
pub struct ResolvedPos {
    pub pos: usize,
    /// `(node, index into its content, absolute position of that child)`
    /// from the document down to the innermost parent.
    path: Vec<(Rc<Node>, usize, usize)>,
    pub parent_offset: usize,
}

/// The child containing `pos` inside `node`'s content and where it starts.
/// A position on a boundary belongs to the child after it.
fn find_index(node: &Node, pos: usize) -> (usize, usize) {
    let mut offset = 0;
    for (index, child) in node.content().iter().enumerate() {
        let end = offset + child.node_size();
        if end == pos {
            return (index + 1, end);
        }
        if end > pos {
            return (index, offset);
        }
        offset = end;
    }
    return (node.child_count(), offset);
}

impl ResolvedPos {
    pub fn resolve(doc: &Rc<Node>, pos: usize) -> Result<ResolvedPos> {
        let size = doc.content_size();
        if pos > size {
            return Err(Error::IndexOutOfBounds { index: pos, len: size });
        }
        let mut path = Vec::new();
        let mut node = doc.clone();
        let mut parent_offset = pos;
        let mut start = 0;
        loop {
            let (index, offset) = find_index(&node, parent_offset);
            let rem = parent_offset - offset;
            path.push((node.clone(), index, start + offset));
            if rem == 0 {
                break;
            }
            let child = node.content()[index].clone();
            if child.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        return Ok(ResolvedPos { pos, path, parent_offset });
    }

    /// How many ancestors above the document the position is nested in.
    pub fn depth(&self) -> usize {
        return self.path.len() - 1;
    }

    /// The ancestor at `depth` (0 is the document).
    pub fn node(&self, depth: usize) -> &Rc<Node> {
        return &self.path[depth].0;
    }

    /// The innermost ancestor.
    pub fn parent(&self) -> &Rc<Node> {
        return self.node(self.depth());
    }

    /// Index of the child the position points into at `depth`.
    pub fn index(&self, depth: usize) -> usize {
        return self.path[depth].1;
    }

    /// Absolute position where the content of the ancestor at `depth` starts.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            return 0;
        }
        return self.path[depth - 1].2 + 1;
    }
}

// =============================================================================
// Tree surgery
// =============================================================================

/// Replace `from..to` of `node`'s content with `insert`. Both ends must sit
/// in the same parent; text runs may be cut, elements may not.
fn replace_range(node: &Rc<Node>, from: usize, to: usize, insert: &[Rc<Node>], depth: usize) -> Option<Rc<Node>> {
    if depth > crate::MAX_DEPTH {
        return None;
    }
    let content = node.content();
    let mut offset = 0;
    for (index, child) in content.iter().enumerate() {
        let end = offset + child.node_size();
        if !child.is_leaf() && from > offset && to < end {
            let inner = replace_range(child, from - offset - 1, to - offset - 1, insert, depth + 1)?;
            let mut next = content.to_vec();
            next[index] = inner;
            return Some(node.with_content(next));
        }
        offset = end;
    }
    if to > offset {
        return None;
    }

    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut offset = 0;
    for child in content {
        let size = child.node_size();
        let end = offset + size;
        if end <= from {
            before.push(child.clone());
        } else if offset >= to {
            after.push(child.clone());
        } else if child.is_text() {
            if offset < from {
                before.push(child.cut_text(0, from - offset));
            }
            if end > to {
                after.push(child.cut_text(to - offset, size));
            }
        } else if offset < from || end > to {
            return None;
        }
        offset = end;
    }
    before.extend(insert.iter().cloned());
    before.extend(after);
    return Some(node.with_content(before));
}

/// Apply `f` to the element starting at `pos`.
fn update_node_at(node: &Rc<Node>, pos: usize, f: &dyn Fn(&Node) -> Rc<Node>, depth: usize) -> Option<Rc<Node>> {
    if depth > crate::MAX_DEPTH {
        return None;
    }
    let content = node.content();
    let mut offset = 0;
    for (index, child) in content.iter().enumerate() {
        let end = offset + child.node_size();
        let replaced = if offset == pos && !child.is_text() {
            Some(f(child))
        } else if pos > offset && pos < end && !child.is_leaf() {
            Some(update_node_at(child, pos - offset - 1, f, depth + 1)?)
        } else {
            None
        };
        if let Some(replaced) = replaced {
            let mut next = content.to_vec();
            next[index] = replaced;
            return Some(node.with_content(next));
        }
        offset = end;
    }
    return None;
}

/// Rewrite the marks of every text run overlapping `from..to`.
fn map_marks(node: &Rc<Node>, from: usize, to: usize, f: &dyn Fn(&[Mark]) -> Vec<Mark>, depth: usize) -> Rc<Node> {
    if depth > crate::MAX_DEPTH {
        return node.clone();
    }
    let mut changed = false;
    let mut next = Vec::with_capacity(node.child_count());
    let mut offset = 0;
    for child in node.content() {
        let size = child.node_size();
        let end = offset + size;
        if end <= from || offset >= to || (child.is_leaf() && !child.is_text()) {
            next.push(child.clone());
        } else if child.is_text() {
            let a = from.max(offset) - offset;
            let b = to.min(end) - offset;
            let marks = f(child.marks());
            if marks != child.marks() {
                changed = true;
            }
            next.push(child.cut_text(0, a));
            next.push(child.cut_text(a, b).with_marks(marks));
            next.push(child.cut_text(b, size));
        } else {
            let inner_from = from.saturating_sub(offset + 1);
            let inner_to = (to - offset - 1).min(child.content_size());
            let inner = map_marks(child, inner_from, inner_to, f, depth + 1);
            if !Rc::ptr_eq(&inner, child) {
                changed = true;
            }
            next.push(inner);
        }
        offset = end;
    }
    if !changed {
        return node.clone();
    }
    return node.with_content(next);
}

// =============================================================================
// Transactions
// =============================================================================

/// A batch of edits to an editor state.
#[derive(Clone, Debug)]
pub struct Transaction {
    before: Rc<Node>,
    doc: Rc<Node>,
    selection: Selection,
    steps: usize,
    add_to_history: bool,
    sync_origin: bool,
    scroll: bool,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Transaction {
        return Transaction {
            before: state.doc.clone(),
            doc: state.doc.clone(),
            selection: state.selection,
            steps: 0,
            add_to_history: true,
            sync_origin: false,
            scroll: false,
        };
    }

    /// The document as of the last step.
    pub fn doc(&self) -> &Rc<Node> {
        return &self.doc;
    }

    /// The document the transaction started from.
    pub fn before(&self) -> &Rc<Node> {
        return &self.before;
    }

    pub fn doc_changed(&self) -> bool {
        return self.steps > 0;
    }

    pub fn selection(&self) -> Selection {
        return self.selection;
    }

    fn step(&mut self, doc: Rc<Node>, map: StepMap) {
        self.doc = doc;
        self.selection = self.selection.map(&map);
        self.steps += 1;
    }

    /// Replace `from..to` with `nodes`. Both ends must sit in the same parent.
    pub fn replace(&mut self, from: usize, to: usize, nodes: Vec<Rc<Node>>) -> Result<&mut Transaction> {
        let size = self.doc.content_size();
        if from > to || to > size {
            return Err(Error::InvalidRange { from, to });
        }
        let inserted: usize = nodes.iter().map(|n| n.node_size()).sum();
        let doc = replace_range(&self.doc, from, to, &nodes, 0).ok_or(Error::InvalidRange { from, to })?;
        self.step(doc, StepMap { from, to, inserted });
        return Ok(self);
    }

    pub fn insert(&mut self, pos: usize, nodes: Vec<Rc<Node>>) -> Result<&mut Transaction> {
        return self.replace(pos, pos, nodes);
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Transaction> {
        return self.replace(from, to, Vec::new());
    }

    /// Insert plain text, taking the marks of the text run it lands in.
    pub fn insert_text(&mut self, pos: usize, text: &str) -> Result<&mut Transaction> {
        if text.is_empty() {
            return Ok(self);
        }
        let resolved = ResolvedPos::resolve(&self.doc, pos)?;
        let parent = resolved.parent();
        let (index, offset) = find_index(parent, resolved.parent_offset);
        let inside = parent.content().get(index).filter(|n| n.is_text() && offset < resolved.parent_offset);
        let before = if index > 0 { parent.content().get(index - 1).filter(|n| n.is_text()) } else { None };
        let marks = inside.or(before).map(|n| n.marks().to_vec()).unwrap_or_default();
        return self.replace(pos, pos, vec![Node::text(text, marks)]);
    }

    /// Set one attribute of the element starting at `pos`.
    pub fn set_node_attr(&mut self, pos: usize, key: &str, value: Value) -> Result<&mut Transaction> {
        let size = self.doc.content_size();
        let update = |node: &Node| {
            let mut attrs = node.attrs().cloned().unwrap_or_default();
            attrs.insert(key.to_string(), value.clone());
            return node.with_attrs(attrs);
        };
        let doc = update_node_at(&self.doc, pos, &update, 0).ok_or(Error::IndexOutOfBounds { index: pos, len: size })?;
        self.step(doc, StepMap { from: pos, to: pos, inserted: 0 });
        return Ok(self);
    }

    /// Add `mark` to every text run in `from..to`.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<&mut Transaction> {
        if from > to || to > self.doc.content_size() {
            return Err(Error::InvalidRange { from, to });
        }
        let add = |marks: &[Mark]| {
            let mut next = marks.to_vec();
            next.push(mark.clone());
            return normalize_marks(next);
        };
        let doc = map_marks(&self.doc, from, to, &add, 0);
        self.step(doc, StepMap { from, to: from, inserted: 0 });
        return Ok(self);
    }

    /// Remove marks named `name` from every text run in `from..to`.
    pub fn remove_mark(&mut self, from: usize, to: usize, name: &str) -> Result<&mut Transaction> {
        if from > to || to > self.doc.content_size() {
            return Err(Error::InvalidRange { from, to });
        }
        let remove = |marks: &[Mark]| {
            return marks.iter().filter(|m| m.name != name).cloned().collect::<Vec<Mark>>();
        };
        let doc = map_marks(&self.doc, from, to, &remove, 0);
        self.step(doc, StepMap { from, to: from, inserted: 0 });
        return Ok(self);
    }

    /// Replace the whole document content.
    pub fn replace_doc_content(&mut self, content: Vec<Rc<Node>>) -> &mut Transaction {
        let old = self.doc.content_size();
        let doc = self.doc.with_content(content);
        let inserted = doc.content_size();
        self.step(doc, StepMap { from: 0, to: old, inserted });
        return self;
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Transaction {
        self.selection = selection.clamp(self.doc.content_size());
        return self;
    }

    /// Whether this transaction should become an undo step.
    pub fn add_to_history(&self) -> bool {
        return self.add_to_history;
    }

    pub fn set_add_to_history(&mut self, add: bool) -> &mut Transaction {
        self.add_to_history = add;
        return self;
    }

    /// Whether this transaction was produced by synchronization.
    pub fn is_sync_origin(&self) -> bool {
        return self.sync_origin;
    }

    pub fn set_sync_origin(&mut self, sync: bool) -> &mut Transaction {
        self.sync_origin = sync;
        return self;
    }

    pub fn scroll_into_view(&mut self) -> &mut Transaction {
        self.scroll = true;
        return self;
    }

    pub fn scrolls(&self) -> bool {
        return self.scroll;
    }
}

// =============================================================================
// State and view
// =============================================================================

/// An immutable document plus a selection.
#[derive(Clone, Debug)]
pub struct EditorState {
    pub doc: Rc<Node>,
    pub selection: Selection,
}

impl EditorState {
    pub fn new(doc: Rc<Node>) -> EditorState {
        return EditorState { doc, selection: Selection::default() };
    }

    /// Start a transaction on this state.
    pub fn tr(&self) -> Transaction {
        return Transaction::new(self);
    }

    pub fn apply(&self, tr: &Transaction) -> EditorState {
        return EditorState {
            doc: tr.doc().clone(),
            selection: tr.selection().clamp(tr.doc().content_size()),
        };
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos> {
        return ResolvedPos::resolve(&self.doc, pos);
    }
}

/// Holds the current editor state and applies transactions to it.
#[derive(Clone, Debug)]
pub struct EditorView {
    state: EditorState,
    schema: Rc<Schema>,
    focused: bool,
    viewport: Option<(usize, usize)>,
    scrolled: bool,
}

impl EditorView {
    pub fn new(state: EditorState, schema: Schema) -> EditorView {
        return EditorView {
            state,
            schema: Rc::new(schema),
            focused: false,
            viewport: None,
            scrolled: false,
        };
    }

    pub fn state(&self) -> &EditorState {
        return &self.state;
    }

    pub fn schema(&self) -> &Rc<Schema> {
        return &self.schema;
    }

    /// Apply a transaction and return the new state.
    pub fn dispatch(&mut self, tr: Transaction) -> &EditorState {
        self.state = self.state.apply(&tr);
        self.scrolled = tr.scrolls();
        return &self.state;
    }

    pub fn has_focus(&self) -> bool {
        return self.focused;
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// The range of positions currently on screen. `None` means everything.
    pub fn viewport(&self) -> Option<(usize, usize)> {
        return self.viewport;
    }

    pub fn set_viewport(&mut self, viewport: Option<(usize, usize)>) {
        self.viewport = viewport;
    }

    /// Whether `pos` is on screen.
    pub fn is_visible(&self, pos: usize) -> bool {
        match self.viewport {
            Some((from, to)) => return from <= pos && pos <= to,
            None => return true,
        }
    }

    /// Whether the last dispatched transaction asked to scroll.
    pub fn scrolled(&self) -> bool {
        return self.scrolled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attrs;

    fn paragraph(text: &str) -> Rc<Node> {
        let content = if text.is_empty() { vec![] } else { vec![Node::text(text, vec![])] };
        return Node::element("paragraph", Attrs::new(), content);
    }

    fn doc(paragraphs: &[&str]) -> Rc<Node> {
        return Node::element("doc", Attrs::new(), paragraphs.iter().map(|p| paragraph(p)).collect());
    }

    #[test]
    fn resolve_reports_depth_and_offsets() {
        let doc = doc(&["ab", "cd"]);
        let pos = ResolvedPos::resolve(&doc, 2).unwrap();
        assert_eq!(pos.depth(), 1);
        assert_eq!(pos.index(0), 0);
        assert_eq!(pos.parent_offset, 1);
        assert_eq!(pos.start(1), 1);

        let between = ResolvedPos::resolve(&doc, 4).unwrap();
        assert_eq!(between.depth(), 0);
        assert_eq!(between.index(0), 1);
        assert!(ResolvedPos::resolve(&doc, 9).is_err());
    }

    #[test]
    fn insert_text_inherits_marks() {
        let bold = vec![Mark::new("bold")];
        let para = Node::element("paragraph", Attrs::new(), vec![Node::text("ab", bold.clone())]);
        let state = EditorState::new(Node::element("doc", Attrs::new(), vec![para]));
        let mut tr = state.tr();
        tr.insert_text(2, "X").unwrap();
        let para = &tr.doc().content()[0];
        assert_eq!(para.child_count(), 1);
        assert_eq!(para.content()[0].text_str(), Some("aXb"));
        assert_eq!(para.content()[0].marks(), &bold[..]);
    }

    #[test]
    fn replace_keeps_untouched_siblings() {
        let state = EditorState::new(doc(&["ab", "cd"]));
        let second = state.doc.content()[1].clone();
        let mut tr = state.tr();
        tr.insert_text(1, "x").unwrap();
        assert_eq!(tr.doc().content()[0].text_content(), "xab");
        assert!(Rc::ptr_eq(&tr.doc().content()[1], &second));
    }

    #[test]
    fn cross_parent_ranges_are_rejected() {
        let state = EditorState::new(doc(&["ab", "cd"]));
        let mut tr = state.tr();
        assert!(matches!(tr.delete(2, 6), Err(Error::InvalidRange { .. })));
        tr.delete(0, 4).unwrap();
        assert_eq!(tr.doc().child_count(), 1);
    }

    #[test]
    fn marks_can_be_added_and_removed() {
        let state = EditorState::new(doc(&["abcd"]));
        let mut tr = state.tr();
        tr.add_mark(2, 4, Mark::new("em")).unwrap();
        let para = tr.doc().content()[0].clone();
        assert_eq!(para.child_count(), 3);
        assert_eq!(para.content()[1].text_str(), Some("bc"));
        tr.remove_mark(0, 6, "em").unwrap();
        assert_eq!(tr.doc().content()[0].child_count(), 1);
    }

    #[test]
    fn set_node_attr_targets_element() {
        let state = EditorState::new(doc(&["ab", "cd"]));
        let mut tr = state.tr();
        tr.set_node_attr(4, "align", Value::from("center")).unwrap();
        let second = &tr.doc().content()[1];
        assert_eq!(second.attrs().unwrap().get("align"), Some(&Value::from("center")));
        assert!(tr.set_node_attr(2, "align", Value::Null).is_err());
    }

    #[test]
    fn selection_maps_through_steps() {
        let mut state = EditorState::new(doc(&["abcd"]));
        state.selection = Selection::cursor(3);
        let mut tr = state.tr();
        tr.insert_text(1, "xy").unwrap();
        assert_eq!(tr.selection(), Selection::cursor(5));
        tr.delete(1, 3).unwrap();
        assert_eq!(tr.selection(), Selection::cursor(3));
    }

    #[test]
    fn view_dispatch_swaps_state() {
        let mut view = EditorView::new(EditorState::new(doc(&["a"])), Schema::open());
        let mut tr = view.state().tr();
        tr.insert_text(1, "b").unwrap().scroll_into_view();
        view.dispatch(tr);
        assert_eq!(view.state().doc.text_content(), "ba");
        assert!(view.scrolled());
        view.set_viewport(Some((0, 2)));
        assert!(view.is_visible(1));
        assert!(!view.is_visible(3));
    }
}
