// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! A live pairing of one shared fragment with one editor view.
//!
//! Local edits go through `Binding::dispatch`, which applies them to the
//! view and patches the shared fragment. Changes to the shared document are
//! queued by an observer and rendered into the view by `Binding::flush`.
//! Observers fire while the document is borrowed, so they never render
//! directly; they only queue.
//!
//! A counter guard is held while the binding writes to either tree. Events
//! committed while it is held are the binding's own echo and are dropped,
//! and entry points called while it is held return without doing anything.
//!
//! The initial render and transitions into or out of snapshot rendering
//! are deferred to the next `tick`. Scheduling new deferred work replaces
//! whatever was pending.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;
use tracing::warn;

use crate::Error;
use crate::Result;
use crate::crdt::BranchId;
use crate::crdt::Origin;
use crate::crdt::RelativePosition;
use crate::crdt::SharedDoc;
use crate::crdt::Snapshot;
use crate::crdt::StackMeta;
use crate::crdt::Subscription;
use crate::crdt::TransactionEvent;
use crate::crdt::UndoManager;
use crate::crdt::UndoOptions;
use crate::crdt::Update;
use crate::editor::EditorView;
use crate::editor::Transaction as EditorTransaction;
use super::cursor::RelativeSelection;
use super::mapping::Mapping;
use super::patch::update_fragment;
use super::position::to_absolute;
use super::position::to_relative;
use super::render::DefaultUsers;
use super::render::UserLookup;
use super::render::apply_repairs;
use super::render::render_current;
use super::render::render_diff;

/// Key under which bindings store the selection in undo stack items.
pub const SELECTION_META: &str = "selection";

// =============================================================================
// Guard
// =============================================================================

/// Suppresses re-entry while the binding writes to either tree.
#[derive(Clone, Debug, Default)]
struct SyncGuard(Rc<Cell<usize>>);

/// Held while the binding is writing. Releases the guard on drop.
struct GuardToken(Rc<Cell<usize>>);

impl SyncGuard {
    fn is_held(&self) -> bool {
        return self.0.get() > 0;
    }

    fn acquire(&self) -> Option<GuardToken> {
        if self.is_held() {
            return None;
        }
        self.0.set(self.0.get() + 1);
        return Some(GuardToken(self.0.clone()));
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

// =============================================================================
// Options
// =============================================================================

/// Options for `Binding::bind`.
pub struct BindingOptions {
    /// Name of the shared root fragment.
    pub fragment: String,
    /// Create an undo manager for the fragment.
    pub track_undo: bool,
    /// Merge consecutive edits into one undo step until the caller ends the
    /// capture with `Binding::stop_capturing`.
    pub capture_transactions: bool,
    /// Resolves authors when rendering snapshots. Defaults to `DefaultUsers`.
    pub user_lookup: Option<Box<dyn UserLookup>>,
}

impl Default for BindingOptions {
    fn default() -> Self {
        return BindingOptions {
            fragment: "prosemirror".to_string(),
            track_undo: true,
            capture_transactions: false,
            user_lookup: None,
        };
    }
}

impl std::fmt::Debug for BindingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("BindingOptions")
            .field("fragment", &self.fragment)
            .field("track_undo", &self.track_undo)
            .field("capture_transactions", &self.capture_transactions)
            .field("user_lookup", &self.user_lookup.is_some())
            .finish();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Deferred {
    InitialRender,
    Snapshot { snapshot: Snapshot, prev: Snapshot },
    Unrender,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Mode {
    Live,
    Snapshot { snapshot: Snapshot, prev: Snapshot },
}

// =============================================================================
// Binding
// =============================================================================

/// Keeps one shared fragment and one editor view in sync.
pub struct Binding {
    doc: SharedDoc,
    fragment: BranchId,
    fragment_name: String,
    view: EditorView,
    mapping: Mapping,
    origin: Origin,
    guard: SyncGuard,
    queue: Rc<RefCell<VecDeque<TransactionEvent>>>,
    subscription: Option<Subscription>,
    deferred: Option<Deferred>,
    mode: Mode,
    undo: Option<UndoManager>,
    /// The editor selection as of the last moment both trees agreed.
    selection: Rc<RefCell<Option<RelativeSelection>>>,
    users: Box<dyn UserLookup>,
    destroyed: bool,
}

impl Binding {
    /// Bind `view` to the fragment named in `options`. Nothing is rendered
    /// until the first `tick`.
    pub fn bind(doc: &SharedDoc, view: EditorView, options: BindingOptions) -> Binding {
        let id = doc.borrow_mut().next_binding_id();
        let origin = Origin::new(format!("sync:{}:{}", options.fragment, id));
        let fragment = doc.borrow_mut().get_or_insert_fragment(&options.fragment);

        let guard = SyncGuard::default();
        let queue: Rc<RefCell<VecDeque<TransactionEvent>>> = Rc::default();
        let subscription = {
            let guard = guard.clone();
            let queue = queue.clone();
            let name = options.fragment.clone();
            doc.borrow_mut().observe_deep(move |event| {
                if guard.is_held() || !event.touches(&name) {
                    return;
                }
                queue.borrow_mut().push_back(event.clone());
            })
        };

        let selection: Rc<RefCell<Option<RelativeSelection>>> = Rc::default();
        let undo = if options.track_undo {
            let mut undo_options = UndoOptions::default();
            undo_options.tracked_origins.clear();
            undo_options.tracked_origins.insert(Some(origin.clone()));
            undo_options.capture_transactions = options.capture_transactions;
            let manager = UndoManager::new(doc, &options.fragment, undo_options);
            let captured = selection.clone();
            manager.on_item_added(move |item| {
                if let Some(selection) = captured.borrow().clone() {
                    let meta: StackMeta = Rc::new(selection);
                    item.meta.insert(SELECTION_META.to_string(), meta);
                }
            });
            Some(manager)
        } else {
            None
        };

        debug!(fragment = %options.fragment, binding = id, "bound editor view");
        return Binding {
            doc: doc.clone(),
            fragment,
            fragment_name: options.fragment,
            view,
            mapping: Mapping::new(),
            origin,
            guard,
            queue,
            subscription: Some(subscription),
            deferred: Some(Deferred::InitialRender),
            mode: Mode::Live,
            undo,
            selection,
            users: options.user_lookup.unwrap_or_else(|| Box::new(DefaultUsers)),
            destroyed: false,
        };
    }

    pub fn view(&self) -> &EditorView {
        return &self.view;
    }

    /// Mutable access to the view, e.g. to change focus or viewport. Call
    /// `editor_changed` after changing the document this way.
    pub fn view_mut(&mut self) -> &mut EditorView {
        return &mut self.view;
    }

    pub fn mapping(&self) -> &Mapping {
        return &self.mapping;
    }

    pub fn doc(&self) -> &SharedDoc {
        return &self.doc;
    }

    pub fn fragment(&self) -> &BranchId {
        return &self.fragment;
    }

    /// The origin tag on every transaction this binding commits.
    pub fn origin(&self) -> &Origin {
        return &self.origin;
    }

    pub fn undo_manager(&self) -> Option<&UndoManager> {
        return self.undo.as_ref();
    }

    pub fn is_destroyed(&self) -> bool {
        return self.destroyed;
    }

    /// Whether the view currently shows a snapshot diff.
    pub fn is_rendering_snapshot(&self) -> bool {
        return matches!(self.mode, Mode::Snapshot { .. });
    }

    /// Number of observed changes waiting for `flush`.
    pub fn pending_events(&self) -> usize {
        return self.queue.borrow().len();
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed);
        }
        return Ok(());
    }

    // =========================================================================
    // Positions
    // =========================================================================

    /// An editor offset as a relative position in the bound fragment.
    pub fn relative_position(&self, pos: usize) -> RelativePosition {
        return to_relative(&self.doc.borrow(), pos, &self.fragment, &self.mapping);
    }

    /// Resolve a relative position to an editor offset.
    pub fn absolute_position(&self, rel: &RelativePosition) -> Option<usize> {
        return to_absolute(&self.doc.borrow(), rel, &self.fragment, &self.mapping);
    }

    fn capture_selection(&mut self) {
        if self.is_rendering_snapshot() {
            return;
        }
        let captured = RelativeSelection::capture(
            &self.doc.borrow(),
            self.view.state().selection,
            &self.fragment,
            &self.mapping,
        );
        *self.selection.borrow_mut() = Some(captured);
    }

    // =========================================================================
    // Editor to shared tree
    // =========================================================================

    /// Apply a local editor transaction and mirror it into the shared tree.
    ///
    /// Pending shared changes are rendered first. A transaction built
    /// against a state that rendering replaced is rejected.
    pub fn dispatch(&mut self, tr: EditorTransaction) -> Result<()> {
        self.ensure_live()?;
        if self.guard.is_held() {
            return Ok(());
        }
        self.flush()?;
        if !Rc::ptr_eq(tr.before(), &self.view.state().doc) {
            return Err(Error::StaleTransaction);
        }
        let changed = tr.doc_changed();
        let add_to_history = tr.add_to_history();
        self.view.dispatch(tr);
        if changed && !self.is_rendering_snapshot() {
            self.patch(add_to_history)?;
        }
        self.capture_selection();
        return Ok(());
    }

    /// Mirror the current editor document into the shared tree.
    pub fn editor_changed(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.is_rendering_snapshot() {
            return Ok(());
        }
        self.patch(true)?;
        self.capture_selection();
        return Ok(());
    }

    fn patch(&mut self, add_to_history: bool) -> Result<()> {
        let Some(_token) = self.guard.acquire() else {
            return Ok(());
        };
        let editor_doc = self.view.state().doc.clone();
        let fragment = &self.fragment;
        let mapping = &mut self.mapping;
        self.doc.borrow_mut().transact(Some(self.origin.clone()), |txn| {
            txn.set_add_to_history(add_to_history);
            return update_fragment(txn, fragment, &editor_doc, mapping);
        })?;
        debug!(fragment = %self.fragment_name, mapped = self.mapping.len(), "patched shared fragment");
        return Ok(());
    }

    // =========================================================================
    // Shared tree to editor
    // =========================================================================

    /// Render queued shared changes into the view. Returns how many events
    /// were consumed.
    pub fn flush(&mut self) -> Result<usize> {
        self.ensure_live()?;
        if self.guard.is_held() {
            return Ok(0);
        }
        let events: Vec<TransactionEvent> = self.queue.borrow_mut().drain(..).collect();
        if events.is_empty() {
            return Ok(0);
        }
        match self.mode.clone() {
            Mode::Snapshot { snapshot, prev } => self.show_snapshot(&snapshot, &prev)?,
            Mode::Live => {
                let mut invalidated = 0;
                for event in &events {
                    invalidated += self.mapping.invalidate(event);
                }
                debug!(events = events.len(), invalidated, "rendering shared changes");
                self.render_live(None)?;
            }
        }
        return Ok(events.len());
    }

    /// Integrate a remote update and render it.
    pub fn apply_update(&mut self, update: Update) -> Result<usize> {
        self.ensure_live()?;
        let applied = self.doc.borrow_mut().apply_update(update);
        self.flush()?;
        return Ok(applied);
    }

    /// Drop the mapping and rebuild the whole view from the shared tree.
    pub fn force_rerender(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.guard.is_held() {
            return Ok(());
        }
        self.queue.borrow_mut().clear();
        self.mapping.clear();
        return self.render_live(None);
    }

    fn render_live(&mut self, restore: Option<RelativeSelection>) -> Result<()> {
        let Some(_token) = self.guard.acquire() else {
            return Ok(());
        };
        let restore = restore.or_else(|| self.selection.borrow().clone());
        let head = self.view.state().selection.head;
        let was_visible = self.view.has_focus() && self.view.is_visible(head);

        let (content, repairs) = {
            let doc = self.doc.borrow();
            render_current(&doc, &self.fragment, self.view.schema(), &mut self.mapping)?
        };
        if !repairs.is_empty() {
            warn!(repairs = repairs.len(), "repairing shared fragment after render");
            self.doc.borrow_mut().transact(Some(self.origin.clone()), |txn| {
                txn.set_add_to_history(false);
                return apply_repairs(txn, &repairs);
            })?;
        }

        let mut tr = self.view.state().tr();
        tr.replace_doc_content(content).set_add_to_history(false).set_sync_origin(true);
        if let Some(restore) = restore {
            let resolved = restore.resolve(&self.doc.borrow(), &self.fragment, &self.mapping);
            if let Some(selection) = resolved {
                tr.set_selection(selection);
                if was_visible {
                    tr.scroll_into_view();
                }
            }
        }
        self.view.dispatch(tr);
        drop(_token);
        self.capture_selection();
        return Ok(());
    }

    fn show_snapshot(&mut self, snapshot: &Snapshot, prev: &Snapshot) -> Result<()> {
        let Some(_token) = self.guard.acquire() else {
            return Ok(());
        };
        if self.doc.borrow().options().gc {
            warn!("rendering a snapshot of a replica that collects garbage");
        }
        self.mapping.clear();
        let content = {
            let doc = self.doc.borrow();
            render_diff(&doc, &self.fragment, self.view.schema(), snapshot, prev, self.users.as_ref())?
        };
        let mut tr = self.view.state().tr();
        tr.replace_doc_content(content).set_add_to_history(false).set_sync_origin(true);
        self.view.dispatch(tr);
        return Ok(());
    }

    // =========================================================================
    // Deferred work
    // =========================================================================

    /// Show the difference between `prev` and `snapshot` from the next tick
    /// on. Local edits are not mirrored while a snapshot is shown.
    pub fn render_snapshot(&mut self, snapshot: Snapshot, prev: Snapshot) -> Result<()> {
        self.ensure_live()?;
        self.deferred = Some(Deferred::Snapshot { snapshot, prev });
        return Ok(());
    }

    /// Return to live rendering on the next tick.
    pub fn unrender_snapshot(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.deferred = Some(Deferred::Unrender);
        return Ok(());
    }

    /// Replace the bound view. The new view is rendered on the next tick,
    /// cancelling any deferred work still pending for the old one.
    pub fn rebind(&mut self, view: EditorView) -> Result<EditorView> {
        self.ensure_live()?;
        let old = std::mem::replace(&mut self.view, view);
        self.mapping.clear();
        self.mode = Mode::Live;
        *self.selection.borrow_mut() = None;
        self.deferred = Some(Deferred::InitialRender);
        return Ok(old);
    }

    /// Whether deferred work is waiting for `tick`.
    pub fn has_deferred(&self) -> bool {
        return self.deferred.is_some();
    }

    /// Run deferred work. Does nothing once the binding is destroyed.
    pub fn tick(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        let Some(work) = self.deferred.take() else {
            return Ok(());
        };
        match work {
            Deferred::InitialRender => {
                let fragment_empty = self.doc.borrow().len(&self.fragment) == 0;
                let editor_has_content = self.view.state().doc.child_count() > 0;
                if fragment_empty && editor_has_content {
                    debug!(fragment = %self.fragment_name, "seeding shared fragment from editor");
                    self.queue.borrow_mut().clear();
                    self.patch(false)?;
                    self.capture_selection();
                } else {
                    self.force_rerender()?;
                }
            }
            Deferred::Snapshot { snapshot, prev } => {
                self.queue.borrow_mut().clear();
                self.mode = Mode::Snapshot { snapshot: snapshot.clone(), prev: prev.clone() };
                self.show_snapshot(&snapshot, &prev)?;
            }
            Deferred::Unrender => {
                self.mode = Mode::Live;
                self.force_rerender()?;
            }
        }
        return Ok(());
    }

    // =========================================================================
    // Undo
    // =========================================================================

    /// End the current undo capture.
    pub fn stop_capturing(&self) {
        if let Some(undo) = &self.undo {
            undo.stop_capturing();
        }
    }

    /// Undo the last local change. Returns whether anything was undone.
    pub fn undo(&mut self) -> Result<bool> {
        return self.pop(true);
    }

    /// Redo the last undone change. Returns whether anything was redone.
    pub fn redo(&mut self) -> Result<bool> {
        return self.pop(false);
    }

    fn pop(&mut self, undo: bool) -> Result<bool> {
        self.ensure_live()?;
        if self.guard.is_held() || self.is_rendering_snapshot() {
            return Ok(false);
        }
        self.flush()?;
        let Some(manager) = &self.undo else {
            return Ok(false);
        };
        let popped = if undo { manager.undo()? } else { manager.redo()? };
        let Some(item) = popped else {
            return Ok(false);
        };
        let restore = item
            .meta
            .get(SELECTION_META)
            .and_then(|meta| meta.downcast_ref::<RelativeSelection>())
            .cloned();
        let events: Vec<TransactionEvent> = self.queue.borrow_mut().drain(..).collect();
        for event in &events {
            self.mapping.invalidate(event);
        }
        self.render_live(restore)?;
        return Ok(true);
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stop observing the document and make the binding inert.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.deferred = None;
        self.queue.borrow_mut().clear();
        self.mapping.clear();
        if let Some(mut undo) = self.undo.take() {
            undo.destroy();
        }
        if let Some(subscription) = self.subscription.take() {
            if let Ok(mut doc) = self.doc.try_borrow_mut() {
                doc.unobserve_deep(subscription);
            }
        }
        debug!(fragment = %self.fragment_name, "binding destroyed");
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.destroy();
    }
}
