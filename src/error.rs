// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Error types shared by the replicated tree, the editor model, and the
//! synchronization core.

use thiserror::Error;

use crate::crdt::BranchId;
use crate::editor::SchemaError;

/// Errors that can occur while editing or synchronizing documents.
#[derive(Error, Debug)]
pub enum Error {
    /// The patcher was asked to reconcile two nodes with different type names.
    ///
    /// This means the caller paired trees that were never comparable.
    #[error("node name mismatch: shared tree has {found:?}, editor has {expected:?}")]
    TypeMismatch { expected: String, found: String },

    /// A branch id did not resolve to a live branch in the document.
    #[error("branch not found: {0:?}")]
    UnknownBranch(BranchId),

    /// A text operation was applied to a branch that is not a text node.
    #[error("branch {0:?} is not a text node")]
    NotText(BranchId),

    /// A structural operation was applied to a text node.
    #[error("branch {0:?} cannot hold embedded nodes")]
    NotContainer(BranchId),

    /// An index or range fell outside of the addressed content.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// An editor range did not address content inside a single parent.
    #[error("invalid editor range {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    /// The editor schema rejected a node.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The renderer met a shared node kind it has no editor counterpart for.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Tree nesting exceeded the supported depth.
    #[error("document nesting exceeds {0} levels")]
    TooDeep(usize),

    /// An encoded update could not be decoded.
    #[error("malformed update: {0}")]
    Decode(#[from] serde_json::Error),

    /// An editor transaction was built against a state the binding has
    /// since replaced.
    #[error("editor transaction does not apply to the current state")]
    StaleTransaction,

    /// The binding was used after `destroy`.
    #[error("binding has been destroyed")]
    Destroyed,
}

/// Result type for document and synchronization operations.
pub type Result<T> = std::result::Result<T, Error>;
