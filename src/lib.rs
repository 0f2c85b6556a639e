// model = "claude-opus-4-5"
// created = "2026-01-30"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Entwine - keeps a rich-text editor tree and a replicated shared tree in
//! step.
//!
//! The shared tree lives in [`crdt`]: named root fragments holding elements
//! and formatted text, merged across replicas without coordination. The
//! editor tree lives in [`editor`]: immutable nodes validated by a schema.
//! [`sync`] translates between the two in both directions.
//!
//! # Quick Start
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use entwine::Attrs;
//! use entwine::crdt::ClientId;
//! use entwine::crdt::Doc;
//! use entwine::editor::EditorState;
//! use entwine::editor::EditorView;
//! use entwine::editor::Node;
//! use entwine::editor::Schema;
//! use entwine::sync::Binding;
//! use entwine::sync::BindingOptions;
//!
//! let doc = Rc::new(RefCell::new(Doc::with_client(ClientId(1))));
//! let empty = Node::element("doc", Attrs::new(), vec![]);
//! let view = EditorView::new(EditorState::new(empty), Schema::open());
//! let mut binding = Binding::bind(&doc, view, BindingOptions::default());
//! binding.tick().unwrap();
//!
//! let paragraph = Node::element("paragraph", Attrs::new(), vec![Node::text("hello", vec![])]);
//! let mut tr = binding.view().state().tr();
//! tr.insert(0, vec![paragraph]).unwrap();
//! binding.dispatch(tr).unwrap();
//!
//! let root = binding.fragment().clone();
//! assert_eq!(doc.borrow().to_xml(&root), "<paragraph>hello</paragraph>");
//! ```

pub mod crdt;
pub mod editor;
pub mod error;
pub mod key;
pub mod sync;

pub use error::Error;
pub use error::Result;
pub use serde_json::Value;

/// Attributes of an element, or formatting of a text run.
pub type Attrs = std::collections::BTreeMap<String, Value>;

/// Deepest nesting the equality check and renderer will descend into.
pub const MAX_DEPTH: usize = 256;
