// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Selections that survive concurrent edits.

use serde::Deserialize;
use serde::Serialize;

use crate::crdt::BranchId;
use crate::crdt::Doc;
use crate::crdt::RelativePosition;
use crate::editor::Selection;
use super::mapping::Mapping;
use super::position::to_absolute;
use super::position::to_relative;

/// An editor selection expressed as two relative positions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeSelection {
    pub anchor: RelativePosition,
    pub head: RelativePosition,
}

impl RelativeSelection {
    pub fn capture(doc: &Doc, selection: Selection, root: &BranchId, mapping: &Mapping) -> RelativeSelection {
        return RelativeSelection {
            anchor: to_relative(doc, selection.anchor, root, mapping),
            head: to_relative(doc, selection.head, root, mapping),
        };
    }

    /// The selection these positions now point at, or `None` when either
    /// end no longer resolves.
    pub fn resolve(&self, doc: &Doc, root: &BranchId, mapping: &Mapping) -> Option<Selection> {
        let anchor = to_absolute(doc, &self.anchor, root, mapping)?;
        let head = to_absolute(doc, &self.head, root, mapping)?;
        return Some(Selection::new(anchor, head));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attrs;
    use crate::crdt::ClientId;
    use crate::editor::Node;
    use crate::sync::patch::update_fragment;

    #[test]
    fn selection_follows_remote_inserts() {
        let mut doc = Doc::with_client(ClientId(1));
        let root = doc.get_or_insert_fragment("prosemirror");
        let editor = Node::element(
            "doc",
            Attrs::new(),
            vec![Node::element("paragraph", Attrs::new(), vec![Node::text("hello", vec![])])],
        );
        let mut mapping = Mapping::new();
        doc.transact(None, |txn| update_fragment(txn, &root, &editor, &mut mapping)).unwrap();

        let captured = RelativeSelection::capture(&doc, Selection::new(2, 4), &root, &mapping);
        let para = doc.children(&root)[0].clone();
        let text = doc.children(&para)[0].clone();
        doc.transact(None, |txn| txn.text_insert(&text, 0, ">> ", &Attrs::new())).unwrap();
        assert_eq!(captured.resolve(&doc, &root, &mapping), Some(Selection::new(5, 7)));

        let json = serde_json::to_string(&captured).unwrap();
        let back: RelativeSelection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, captured);
    }

    #[test]
    fn deleted_anchors_resolve_to_none() {
        let mut doc = Doc::with_client(ClientId(1));
        let root = doc.get_or_insert_fragment("prosemirror");
        let editor = Node::element(
            "doc",
            Attrs::new(),
            vec![
                Node::element("paragraph", Attrs::new(), vec![Node::text("one", vec![])]),
                Node::element("paragraph", Attrs::new(), vec![Node::text("two", vec![])]),
            ],
        );
        let mut mapping = Mapping::new();
        doc.transact(None, |txn| update_fragment(txn, &root, &editor, &mut mapping)).unwrap();
        let captured = RelativeSelection::capture(&doc, Selection::cursor(7), &root, &mapping);
        doc.transact(None, |txn| txn.remove_range(&root, 1, 1)).unwrap();
        doc.collect_garbage();
        assert_eq!(captured.resolve(&doc, &root, &mapping), None);
    }
}
