// model = "claude-opus-4-5"
// created = "2026-01-30"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! The shared tree: a replicated document of named fragments, elements,
//! and formatted text that converges under concurrent edits.

use std::cell::RefCell;
use std::rc::Rc;

mod clock;
mod doc;
mod event;
mod id;
mod position;
mod snapshot;
mod txn;
mod undo;
mod update;

pub use clock::LamportClock;
pub use clock::StateVector;
pub use doc::BranchKind;
pub use doc::Doc;
pub use doc::DocOptions;
pub use doc::Run;
pub use doc::Subscription;
pub use event::Origin;
pub use event::TransactionEvent;
pub use id::BranchId;
pub use id::ClientId;
pub use id::Stamp;
pub use id::StructId;
pub use position::AbsolutePosition;
pub use position::Assoc;
pub use position::RelativePosition;
pub use snapshot::ChangeKind;
pub use snapshot::Snapshot;
pub use snapshot::YChange;
pub use txn::Transaction;
pub use undo::StackItem;
pub use undo::StackMeta;
pub use undo::UndoManager;
pub use undo::UndoOptions;
pub use update::Op;
pub use update::OpContent;
pub use update::OpKind;
pub use update::Update;

/// A replica shared between a binding and whatever feeds it remote updates.
pub type SharedDoc = Rc<RefCell<Doc>>;
