// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Benchmarks for the patch and render paths.
//!
//! Run with: cargo bench --bench sync_bench

use std::rc::Rc;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use entwine::Attrs;
use entwine::crdt::BranchId;
use entwine::crdt::ClientId;
use entwine::crdt::Doc;
use entwine::editor::Mark;
use entwine::editor::Node;
use entwine::editor::Schema;
use entwine::sync::Mapping;
use entwine::sync::render_current;
use entwine::sync::update_fragment;

// =============================================================================
// Fixtures
// =============================================================================

const SIZES: &[usize] = &[10, 100, 1000];

fn paragraph(i: usize) -> Rc<Node> {
    let plain = Node::text(&format!("paragraph number {} ", i), vec![]);
    let bold = Node::text("with some bold text", vec![Mark::new("bold")]);
    return Node::element("paragraph", Attrs::new(), vec![plain, bold]);
}

fn document(paragraphs: usize) -> Rc<Node> {
    return Node::element("doc", Attrs::new(), (0..paragraphs).map(paragraph).collect());
}

fn seeded(editor: &Rc<Node>) -> (Doc, BranchId, Mapping) {
    let mut doc = Doc::with_client(ClientId(1));
    let root = doc.get_or_insert_fragment("prosemirror");
    let mut mapping = Mapping::new();
    doc.transact(None, |txn| update_fragment(txn, &root, editor, &mut mapping)).unwrap();
    return (doc, root, mapping);
}

/// The same document with one character typed into the middle paragraph.
fn with_keystroke(editor: &Rc<Node>) -> Rc<Node> {
    let mut content = editor.content().to_vec();
    let middle = content.len() / 2;
    let para = &content[middle];
    let mut runs = para.content().to_vec();
    let typed = format!("{}x", runs[0].text_str().unwrap_or_default());
    runs[0] = Node::text(&typed, vec![]);
    content[middle] = para.with_content(runs);
    return editor.with_content(content);
}

// =============================================================================
// Patching
// =============================================================================

fn bench_initial_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_patch");
    for &size in SIZES {
        let editor = document(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &editor, |b, editor| {
            b.iter(|| black_box(seeded(editor)));
        });
    }
    group.finish();
}

fn bench_keystroke_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("keystroke_patch");
    for &size in SIZES {
        let editor = document(size);
        let typed = with_keystroke(&editor);
        group.bench_with_input(BenchmarkId::from_parameter(size), &typed, |b, typed| {
            b.iter_batched(
                || seeded(&editor),
                |(mut doc, root, mut mapping)| {
                    doc.transact(None, |txn| update_fragment(txn, &root, typed, &mut mapping)).unwrap();
                    black_box(doc)
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

// =============================================================================
// Rendering
// =============================================================================

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let schema = Schema::open();
    for &size in SIZES {
        let (doc, root, _) = seeded(&document(size));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("cold", size), &size, |b, _| {
            b.iter(|| black_box(render_current(&doc, &root, &schema, &mut Mapping::new()).unwrap()));
        });

        let mut warm = Mapping::new();
        render_current(&doc, &root, &schema, &mut warm).unwrap();
        group.bench_with_input(BenchmarkId::new("warm", size), &size, |b, _| {
            b.iter(|| black_box(render_current(&doc, &root, &schema, &mut warm).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_initial_patch, bench_keystroke_patch, bench_render);
criterion_main!(benches);
