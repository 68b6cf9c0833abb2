// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. store::StoreError)
    clippy::module_name_repetitions
)]

//! # Codepane
//!
//! A caret-preserving syntax-highlight editor core.
//!
//! Codepane keeps three things consistent across every edit, paste and
//! assisted insertion:
//! - The plain text of each document
//! - The syntax-highlighted view rendered from it
//! - The caret position inside that view
//!
//! ## Architecture
//!
//! The workspace uses The Elm Architecture (TEA) pattern:
//! - **Model**: Open documents, the active surface, theme state
//! - **Message**: Edits, tab changes, service responses, clock ticks
//! - **Update**: Pure state transitions
//! - **Effects**: Background services and persistence
//!
//! ## Modules
//!
//! - [`surface`]: The editable highlight surface and caret arithmetic
//! - [`highlight`]: Renderers and the plain-text fallback
//! - [`app`]: Workspace state and the service loop
//! - [`assist`]: Completion and theme services
//! - [`store`]: Document storage and session persistence
//! - [`debounce`]: Trailing-edge debouncing
//! - [`worker`]: Background request/response threads

pub mod app;
pub mod assist;
pub mod config;
pub mod debounce;
pub mod highlight;
pub mod perf;
pub mod store;
pub mod surface;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, Message, Model};
    pub use crate::highlight::{HighlightBackground, Renderer, SyntectRenderer};
    pub use crate::store::{Document, FileStore};
    pub use crate::surface::{HighlightSurface, Markup, insert_at};
}
