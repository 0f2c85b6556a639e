// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Editor offsets to relative positions and back.
//!
//! Editor positions count tokens: one per character, one per leaf, and one
//! for each opening and closing boundary of other elements. The shared tree
//! does not know how large a rendered element is, so both directions read
//! element sizes from the mapping. Unmapped elements count as size zero.

use tracing::trace;

use crate::crdt::Assoc;
use crate::crdt::BranchId;
use crate::crdt::BranchKind;
use crate::crdt::Doc;
use crate::crdt::RelativePosition;
use super::mapping::Mapping;

fn next_sibling(doc: &Doc, branch: &BranchId) -> Option<BranchId> {
    let id = branch.item()?;
    return doc.next_visible_sibling(&id).map(BranchId::Item);
}

fn first_child(doc: &Doc, branch: &BranchId) -> Option<BranchId> {
    return doc.first_visible_child(branch).map(BranchId::Item);
}

fn is_text(doc: &Doc, branch: &BranchId) -> bool {
    return doc.kind(branch) == Some(BranchKind::Text);
}

/// Tokens a shared child occupies in the editor.
fn rendered_size(doc: &Doc, branch: &BranchId, mapping: &Mapping) -> usize {
    if is_text(doc, branch) {
        return doc.len(branch);
    }
    return mapping.node_size(branch);
}

fn end_of(doc: &Doc, root: &BranchId) -> RelativePosition {
    return doc.relative_position(root, doc.len(root), Assoc::Before);
}

/// Climb from `n` to the nearest ancestor that has a next sibling, or to
/// `root`, consuming one closing boundary per level.
fn climb(doc: &Doc, mut n: BranchId, pos: &mut i64, root: &BranchId) -> Option<BranchId> {
    loop {
        n = doc.parent(&n)?;
        *pos -= 1;
        if n == *root || n.is_root() || next_sibling(doc, &n).is_some() {
            break;
        }
    }
    if n == *root {
        return Some(n);
    }
    return next_sibling(doc, &n);
}

/// Convert an editor offset into a position relative to the shared tree
/// under `root`.
pub fn to_relative(doc: &Doc, pos: usize, root: &BranchId, mapping: &Mapping) -> RelativePosition {
    if pos == 0 {
        return doc.relative_position(root, 0, Assoc::Before);
    }
    let mut pos = pos as i64;
    let Some(mut n) = first_child(doc, root) else {
        return end_of(doc, root);
    };
    while n != *root {
        if is_text(doc, &n) {
            let len = doc.len(&n) as i64;
            if len >= pos {
                return doc.relative_position(&n, pos as usize, Assoc::Before);
            }
            pos -= len;
            n = match next_sibling(doc, &n) {
                Some(next) => next,
                None => match climb(doc, n, &mut pos, root) {
                    Some(next) => next,
                    None => return end_of(doc, root),
                },
            };
        } else {
            let size = mapping.node_size(&n) as i64;
            match first_child(doc, &n) {
                Some(child) if pos < size => {
                    n = child;
                    pos -= 1;
                }
                _ => {
                    if pos == 1 && doc.len(&n) == 0 && size > 1 {
                        // Lands inside an empty element.
                        trace!(branch = ?n, "anchoring inside empty element");
                        return RelativePosition::in_branch(n, Assoc::After);
                    }
                    pos -= size;
                    n = match next_sibling(doc, &n) {
                        Some(next) => next,
                        None => {
                            if pos == 0 {
                                let parent = doc.parent(&n).unwrap_or(n);
                                return RelativePosition::in_branch(parent, Assoc::After);
                            }
                            match climb(doc, n, &mut pos, root) {
                                Some(next) => next,
                                None => return end_of(doc, root),
                            }
                        }
                    };
                }
            }
        }
        if pos == 0 && n != *root && !is_text(doc, &n) {
            if let Some(id) = n.item() {
                return RelativePosition::at_item(id, Assoc::After);
            }
        }
    }
    return end_of(doc, root);
}

/// Resolve a relative position to an editor offset.
///
/// Returns `None` when the anchor no longer resolves, or resolves outside
/// `root`.
pub fn to_absolute(doc: &Doc, rel: &RelativePosition, root: &BranchId, mapping: &Mapping) -> Option<usize> {
    let resolved = doc.absolute_position(rel)?;
    let mut branch = resolved.branch;
    if branch != *root && !doc.is_ancestor(root, &branch) {
        return None;
    }

    let mut pos: i64 = 0;
    if is_text(doc, &branch) {
        pos = resolved.index as i64;
    } else if !doc.is_deleted(&branch) {
        for child in doc.children(&branch).iter().take(resolved.index) {
            pos += rendered_size(doc, child, mapping) as i64;
        }
        pos += 1;
    }

    while branch != *root {
        let Some(parent) = doc.parent(&branch) else {
            break;
        };
        if !doc.is_deleted(&parent) {
            pos += 1;
            let siblings = doc.branch(&parent).map(|b| b.children.clone()).unwrap_or_default();
            for id in siblings {
                let sibling = BranchId::Item(id);
                if sibling == branch {
                    break;
                }
                if !doc.is_deleted(&sibling) {
                    pos += rendered_size(doc, &sibling, mapping) as i64;
                }
            }
        }
        branch = parent;
    }
    return usize::try_from(pos - 1).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attrs;
    use crate::crdt::ClientId;
    use crate::editor::Node;
    use crate::sync::patch::update_fragment;

    fn para(text: &str) -> std::rc::Rc<Node> {
        let content = if text.is_empty() { vec![] } else { vec![Node::text(text, vec![])] };
        return Node::element("paragraph", Attrs::new(), content);
    }

    fn setup(paragraphs: &[&str]) -> (Doc, BranchId, Mapping, usize) {
        let mut doc = Doc::with_client(ClientId(1));
        let root = doc.get_or_insert_fragment("prosemirror");
        let editor = Node::element("doc", Attrs::new(), paragraphs.iter().map(|p| para(p)).collect());
        let mut mapping = Mapping::new();
        doc.transact(None, |txn| update_fragment(txn, &root, &editor, &mut mapping)).unwrap();
        return (doc, root, mapping, editor.content_size());
    }

    #[test]
    fn every_offset_round_trips() {
        let (doc, root, mapping, size) = setup(&["123", "", "456"]);
        for pos in 0..=size {
            let rel = to_relative(&doc, pos, &root, &mapping);
            assert_eq!(to_absolute(&doc, &rel, &root, &mapping), Some(pos), "offset {}", pos);
        }
    }

    #[test]
    fn positions_shift_with_inserts() {
        let (mut doc, root, mapping, _) = setup(&["abc"]);
        let rel = to_relative(&doc, 3, &root, &mapping);
        let para = doc.children(&root)[0].clone();
        let text = doc.children(&para)[0].clone();
        doc.transact(None, |txn| txn.text_insert(&text, 0, "xy", &Attrs::new())).unwrap();
        assert_eq!(to_absolute(&doc, &rel, &root, &mapping), Some(5));
    }

    #[test]
    fn foreign_anchors_resolve_to_none() {
        let (mut doc, root, mapping, _) = setup(&["abc"]);
        let other = doc.get_or_insert_fragment("other");
        let text = doc.transact(None, |txn| txn.insert_text(&other, 0)).unwrap();
        let rel = RelativePosition::in_branch(text, Assoc::Before);
        assert_eq!(to_absolute(&doc, &rel, &root, &mapping), None);
    }

    #[test]
    fn deleted_anchors_collapse_to_neighbour() {
        let (mut doc, root, mut mapping, _) = setup(&["abcdef"]);
        let rel = to_relative(&doc, 4, &root, &mapping);
        let editor = Node::element("doc", Attrs::new(), vec![para("af")]);
        doc.transact(None, |txn| update_fragment(txn, &root, &editor, &mut mapping)).unwrap();
        // The anchored character is deleted but its item is still present.
        assert!(doc.collected.is_empty());
        assert_eq!(to_absolute(&doc, &rel, &root, &mapping), Some(2));
    }

    #[test]
    fn collected_anchors_resolve_to_none() {
        let (mut doc, root, mapping, _) = setup(&["abc", "def"]);
        let rel = to_relative(&doc, 7, &root, &mapping);
        doc.transact(None, |txn| txn.remove_range(&root, 1, 1)).unwrap();
        doc.collect_garbage();
        assert_eq!(to_absolute(&doc, &rel, &root, &mapping), None);
    }
}
