// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Two-way synchronization between an editor tree and a shared fragment.
//!
//! The pieces compose bottom-up: `mapping` remembers which editor node was
//! produced from which shared branch, `equality` decides when the two sides
//! already agree, `patch` pushes editor changes into the shared tree,
//! `render` pulls the shared tree back out, `position` and `cursor` carry
//! selections across, and `binding` wires it all to one editor view.

mod binding;
mod cursor;
mod equality;
mod mapping;
mod patch;
mod position;
mod render;

pub use binding::Binding;
pub use binding::BindingOptions;
pub use binding::SELECTION_META;
pub use cursor::RelativeSelection;
pub use equality::Match;
pub use equality::Span;
pub use equality::attrs_equal;
pub use equality::child_match;
pub use equality::identity_matches;
pub use equality::mark_attrs;
pub use equality::mark_value;
pub use equality::matching_prefix_suffix;
pub use equality::nodes_equal;
pub use equality::normalize_children;
pub use equality::text_equal;
pub use equality::values_equal;
pub use mapping::Mapped;
pub use mapping::Mapping;
pub use patch::Diff;
pub use patch::run_formats;
pub use patch::simple_diff;
pub use patch::update_fragment;
pub use position::to_absolute;
pub use position::to_relative;
pub use render::DefaultUsers;
pub use render::Renderer;
pub use render::Repair;
pub use render::UserInfo;
pub use render::UserLookup;
pub use render::apply_repairs;
pub use render::change_attrs;
pub use render::change_value;
pub use render::render_current;
pub use render::render_diff;
