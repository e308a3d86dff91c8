//! tandem-editor-core: Pure Rust editor logic without CRDT dependencies.
//!
//! This crate provides:
//! - `TextBuffer` trait for text storage abstraction
//! - `EditorRope` - ropey-backed implementation
//! - `ChangeSet` - batched edits expressed against the pre-batch buffer
//! - `Transaction` / `BufferUpdate` - what gets dispatched and what it did
//! - `EditorState<T>` - buffer, selection and focus, generic over TextBuffer
//! - `DecorationSet` - marks, line markers and widgets drawn over the text

pub mod change;
pub mod decoration;
pub mod error;
pub mod state;
pub mod text;
pub mod transaction;
pub mod types;

pub use change::{BufferEdit, ChangeRange, ChangeSet};
pub use decoration::{Decoration, DecorationClass, DecorationSet, Widget};
pub use error::EditError;
pub use smol_str::SmolStr;
pub use state::EditorState;
pub use text::{EditorRope, TextBuffer};
pub use transaction::{BufferUpdate, Origin, Transaction};
pub use types::{Assoc, Line, Selection};
