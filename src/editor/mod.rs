// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! The editor tree: immutable nodes, a schema to validate them, and the
//! state/transaction/view machinery that edits them.

mod node;
mod schema;
mod state;

pub use node::Mark;
pub use node::Node;
pub use node::normalize_content;
pub use node::normalize_marks;
pub use schema::MarkSpec;
pub use schema::NodeSpec;
pub use schema::SYNC_MARKER;
pub use schema::Schema;
pub use schema::SchemaBuilder;
pub use schema::SchemaError;
pub use state::EditorState;
pub use state::EditorView;
pub use state::ResolvedPos;
pub use state::Selection;
pub use state::Transaction;
