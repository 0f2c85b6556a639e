// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Property-based tests for patching editor trees into a shared fragment
//! and rendering them back out.

use std::rc::Rc;

use proptest::prelude::*;

use entwine::Attrs;
use entwine::crdt::BranchId;
use entwine::crdt::ClientId;
use entwine::crdt::Doc;
use entwine::editor::Mark;
use entwine::editor::MarkSpec;
use entwine::editor::Node;
use entwine::editor::NodeSpec;
use entwine::editor::Schema;
use entwine::sync::Mapping;
use entwine::sync::render_current;
use entwine::sync::update_fragment;

// =============================================================================
// Test helpers
// =============================================================================

fn schema() -> Schema {
    return Schema::builder()
        .node("paragraph", NodeSpec::new())
        .node("heading", NodeSpec::new().required("level"))
        .mark("bold", MarkSpec::new())
        .mark("italic", MarkSpec::new())
        .build();
}

/// A text run: its text and whether it is bold and/or italic.
type RunSpec = (String, bool, bool);

#[derive(Clone, Debug)]
enum BlockSpec {
    Paragraph(Vec<RunSpec>),
    Heading(u64, Vec<RunSpec>),
}

fn arbitrary_runs() -> impl Strategy<Value = Vec<RunSpec>> {
    return prop::collection::vec(("[a-z]{0,5}", any::<bool>(), any::<bool>()), 0..4);
}

fn arbitrary_block() -> impl Strategy<Value = BlockSpec> {
    return prop_oneof![
        arbitrary_runs().prop_map(BlockSpec::Paragraph),
        (1..4u64, arbitrary_runs()).prop_map(|(level, runs)| BlockSpec::Heading(level, runs)),
    ];
}

fn arbitrary_doc() -> impl Strategy<Value = Vec<BlockSpec>> {
    return prop::collection::vec(arbitrary_block(), 0..6);
}

fn build_runs(runs: &[RunSpec]) -> Vec<Rc<Node>> {
    let mut nodes = Vec::new();
    for (text, bold, italic) in runs {
        let mut marks = Vec::new();
        if *bold {
            marks.push(Mark::new("bold"));
        }
        if *italic {
            marks.push(Mark::new("italic"));
        }
        nodes.push(Node::text(text, marks));
    }
    return nodes;
}

fn build_doc(blocks: &[BlockSpec]) -> Rc<Node> {
    let mut content = Vec::new();
    for block in blocks {
        match block {
            BlockSpec::Paragraph(runs) => {
                content.push(Node::element("paragraph", Attrs::new(), build_runs(runs)));
            }
            BlockSpec::Heading(level, runs) => {
                let mut attrs = Attrs::new();
                attrs.insert("level".to_string(), serde_json::json!(level));
                content.push(Node::element("heading", attrs, build_runs(runs)));
            }
        }
    }
    return Node::element("doc", Attrs::new(), content);
}

fn fresh() -> (Doc, BranchId) {
    let mut doc = Doc::with_client(ClientId(1));
    let root = doc.get_or_insert_fragment("prosemirror");
    return (doc, root);
}

fn patch(doc: &mut Doc, root: &BranchId, editor: &Rc<Node>, mapping: &mut Mapping) {
    doc.transact(None, |txn| update_fragment(txn, root, editor, mapping)).unwrap();
}

fn render(doc: &Doc, root: &BranchId) -> Vec<Rc<Node>> {
    let (content, repairs) = render_current(doc, root, &schema(), &mut Mapping::new()).unwrap();
    assert!(repairs.is_empty());
    return content;
}

// =============================================================================
// Round trips
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn patched_trees_render_back(blocks in arbitrary_doc()) {
        let editor = build_doc(&blocks);
        let (mut doc, root) = fresh();
        patch(&mut doc, &root, &editor, &mut Mapping::new());
        prop_assert_eq!(render(&doc, &root), editor.content().to_vec());
    }

    #[test]
    fn patching_an_equal_tree_is_a_no_op(blocks in arbitrary_doc()) {
        let editor = build_doc(&blocks);
        let (mut doc, root) = fresh();
        let mut mapping = Mapping::new();
        patch(&mut doc, &root, &editor, &mut mapping);
        let before = doc.state_vector();

        patch(&mut doc, &root, &editor, &mut mapping);
        prop_assert_eq!(doc.state_vector(), before.clone());

        // A structurally equal tree with no shared identity.
        let copy = build_doc(&blocks);
        patch(&mut doc, &root, &copy, &mut Mapping::new());
        prop_assert_eq!(doc.state_vector(), before);
    }

    #[test]
    fn successive_patches_converge(first in arbitrary_doc(), second in arbitrary_doc()) {
        let (mut doc, root) = fresh();
        let mut mapping = Mapping::new();
        patch(&mut doc, &root, &build_doc(&first), &mut mapping);
        let target = build_doc(&second);
        patch(&mut doc, &root, &target, &mut mapping);
        prop_assert_eq!(render(&doc, &root), target.content().to_vec());
    }
}

// =============================================================================
// Replicas
// =============================================================================

#[test]
fn replicas_render_the_same_tree() {
    let editor = build_doc(&[
        BlockSpec::Heading(1, vec![("title".to_string(), true, false)]),
        BlockSpec::Paragraph(vec![("plain ".to_string(), false, false), ("loud".to_string(), true, true)]),
        BlockSpec::Paragraph(vec![]),
    ]);
    let (mut a, root) = fresh();
    patch(&mut a, &root, &editor, &mut Mapping::new());

    let mut b = Doc::with_client(ClientId(2));
    b.apply_update(a.encode_diff(&b.state_vector()));
    assert_eq!(b.to_xml(&root), a.to_xml(&root));
    assert_eq!(render(&b, &root), editor.content().to_vec());
}
