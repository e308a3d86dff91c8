//! Loro-backed collaborative editing for tandem-editor-core.
//!
//! This crate provides:
//! - `SharedText`: a Loro document and the text container an editor binds to
//! - `PositionCodec`: buffer offsets to document-stable positions and back
//! - Delta translation between Loro text diffs and buffer edits
//! - `SyncEngine`: two-way sync between an `EditorState` and a `SharedText`
//! - `Awareness` and `RemoteSelections`: presence and remote cursor rendering
//! - `UndoCoordinator`: local-only undo/redo with selection restore
//! - `CollabBinding`: all of the above wired into one editor

mod binding;
mod config;
mod document;
mod error;
mod palette;
mod remote;
mod undo;

pub mod awareness;
pub mod delta;
pub mod position;
pub mod sync;

pub use awareness::{
    Awareness, AwarenessChange, AwarenessUpdate, ClientId, SharedAwareness, UserInfo,
};
pub use binding::{CollabBinding, attribution_decorations};
pub use config::{CollabConfig, UndoSetting};
pub use delta::{Attribution, AttributionKind, AttributionRange, DeltaSegment};
pub use document::{DEFAULT_TEXT_NAME, SharedText};
pub use error::CrdtError;
pub use palette::{DEFAULT_USER_COLORS, UserColor, UserPalette};
pub use position::{
    AbsolutePosition, DecodedRange, PositionCodec, RelativePosition, RelativeRange,
};
pub use remote::{RemoteSelections, RemoteUserDefaults};
pub use sync::{EngineState, RemoteApply, SyncEngine};
pub use undo::{HistoryCommand, UndoConfig, UndoCoordinator};

// Re-export Loro types that consumers need
pub use loro::{ExportMode, LoroDoc, LoroText, VersionVector};
