// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Property-based tests for translating editor offsets through relative
//! positions, over flat documents and over nested blockquotes with empty
//! paragraphs and hard breaks.

use std::rc::Rc;

use proptest::prelude::*;

use entwine::Attrs;
use entwine::crdt::BranchId;
use entwine::crdt::ClientId;
use entwine::crdt::Doc;
use entwine::crdt::RelativePosition;
use entwine::editor::Node;
use entwine::editor::NodeSpec;
use entwine::editor::Schema;
use entwine::sync::Mapping;
use entwine::sync::render_current;
use entwine::sync::to_absolute;
use entwine::sync::to_relative;
use entwine::sync::update_fragment;

// =============================================================================
// Test helpers
// =============================================================================

fn paragraph(text: &str) -> Rc<Node> {
    return Node::element("paragraph", Attrs::new(), vec![Node::text(text, vec![])]);
}

fn setup(paragraphs: &[String]) -> (Doc, BranchId, Mapping, usize) {
    let mut doc = Doc::with_client(ClientId(1));
    let root = doc.get_or_insert_fragment("prosemirror");
    let editor = Node::element("doc", Attrs::new(), paragraphs.iter().map(|p| paragraph(p)).collect());
    let mut mapping = Mapping::new();
    doc.transact(None, |txn| update_fragment(txn, &root, &editor, &mut mapping)).unwrap();
    return (doc, root, mapping, editor.content_size());
}

fn arbitrary_paragraphs() -> impl Strategy<Value = Vec<String>> {
    return prop::collection::vec("[a-z]{0,4}", 0..5);
}

fn schema() -> Schema {
    return Schema::builder()
        .node("doc", NodeSpec::new())
        .node("paragraph", NodeSpec::new())
        .node("blockquote", NodeSpec::new())
        .node("br", NodeSpec::leaf())
        .build();
}

fn element(name: &str, content: Vec<Rc<Node>>) -> Rc<Node> {
    return Node::element(name, Attrs::new(), content);
}

fn text(text: &str) -> Rc<Node> {
    return Node::text(text, vec![]);
}

fn br() -> Rc<Node> {
    return Node::leaf("br", Attrs::new());
}

fn setup_tree(editor: &Rc<Node>) -> (Doc, BranchId, Mapping) {
    let mut doc = Doc::with_client(ClientId(1));
    let root = doc.get_or_insert_fragment("prosemirror");
    let mut mapping = Mapping::new();
    doc.transact(None, |txn| update_fragment(txn, &root, editor, &mut mapping)).unwrap();
    return (doc, root, mapping);
}

/// A mapping rebuilt from the shared tree alone, as a freshly bound editor
/// would see it.
fn rendered_mapping(doc: &Doc, root: &BranchId, editor: &Rc<Node>) -> Mapping {
    let mut mapping = Mapping::new();
    let (content, repairs) = render_current(doc, root, &schema(), &mut mapping).unwrap();
    assert!(repairs.is_empty());
    assert_eq!(content, editor.content().to_vec());
    return mapping;
}

fn arbitrary_inline() -> impl Strategy<Value = Rc<Node>> {
    return prop_oneof![
        3 => "[a-z]{1,3}".prop_map(|t| text(&t)),
        1 => Just(br()),
    ];
}

/// Paragraphs of text and breaks, possibly empty, nested inside possibly
/// empty blockquotes.
fn arbitrary_block() -> impl Strategy<Value = Rc<Node>> {
    let paragraph = prop::collection::vec(arbitrary_inline(), 0..4)
        .prop_map(|content| element("paragraph", content));
    return paragraph.prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(|content| element("blockquote", content))
    });
}

fn arbitrary_tree() -> impl Strategy<Value = Rc<Node>> {
    return prop::collection::vec(arbitrary_block(), 0..4).prop_map(|content| element("doc", content));
}

fn assert_round_trips(doc: &Doc, root: &BranchId, mapping: &Mapping, size: usize) {
    for pos in 0..=size {
        let rel = to_relative(doc, pos, root, mapping);
        assert_eq!(to_absolute(doc, &rel, root, mapping), Some(pos), "offset {}", pos);
    }
}

// =============================================================================
// Fixed cases
// =============================================================================

#[test]
fn nested_tree_round_trips() {
    let editor = element("doc", vec![
        element("paragraph", vec![text("ab")]),
        element("blockquote", vec![
            element("paragraph", vec![text("cd")]),
            element("paragraph", vec![]),
            element("paragraph", vec![text("x"), br(), text("y")]),
        ]),
        element("paragraph", vec![]),
    ]);
    assert_eq!(editor.content_size(), 19);

    let (doc, root, mapping) = setup_tree(&editor);
    assert_round_trips(&doc, &root, &mapping, 19);

    let rendered = rendered_mapping(&doc, &root, &editor);
    assert_round_trips(&doc, &root, &rendered, 19);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn every_offset_round_trips(paragraphs in arbitrary_paragraphs()) {
        let (doc, root, mapping, size) = setup(&paragraphs);
        for pos in 0..=size {
            let rel = to_relative(&doc, pos, &root, &mapping);
            prop_assert_eq!(to_absolute(&doc, &rel, &root, &mapping), Some(pos));
        }
    }

    #[test]
    fn relative_positions_serialize(paragraphs in arbitrary_paragraphs(), pick in any::<prop::sample::Index>()) {
        let (doc, root, mapping, size) = setup(&paragraphs);
        let pos = pick.index(size + 1);
        let rel = to_relative(&doc, pos, &root, &mapping);
        let json = serde_json::to_string(&rel).unwrap();
        let back: RelativePosition = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(to_absolute(&doc, &back, &root, &mapping), Some(pos));
    }

    #[test]
    fn nested_offsets_round_trip(editor in arbitrary_tree()) {
        let (doc, root, mapping) = setup_tree(&editor);
        for pos in 0..=editor.content_size() {
            let rel = to_relative(&doc, pos, &root, &mapping);
            prop_assert_eq!(to_absolute(&doc, &rel, &root, &mapping), Some(pos));
        }
    }

    #[test]
    fn rendered_mapping_round_trips(editor in arbitrary_tree()) {
        let (doc, root, _) = setup_tree(&editor);
        let mapping = rendered_mapping(&doc, &root, &editor);
        for pos in 0..=editor.content_size() {
            let rel = to_relative(&doc, pos, &root, &mapping);
            prop_assert_eq!(to_absolute(&doc, &rel, &root, &mapping), Some(pos));
        }
    }
}
