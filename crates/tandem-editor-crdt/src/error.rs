//! Error types for CRDT operations.

use tandem_editor_core::EditError;
use thiserror::Error;

/// Errors that can occur while binding a buffer to a Loro document.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CrdtError {
    /// A relative position belongs to a different container than the one
    /// it is being resolved against.
    #[error("position belongs to container {found}, expected {expected}")]
    ForeignPosition { expected: String, found: String },

    /// The document could not resolve a relative position.
    #[error("cannot resolve relative position: {0}")]
    UnresolvablePosition(String),

    /// A change description with inconsistent retain/insert/delete lengths.
    #[error("malformed delta: {0}")]
    MalformedDelta(String),

    /// The document already has a binding recording undo history.
    #[error("document already has an undo history bound to it")]
    HistoryInUse,

    /// The component was destroyed and can no longer be used.
    #[error("binding has been destroyed")]
    Destroyed,

    /// A buffer transaction was rejected.
    #[error(transparent)]
    Edit(#[from] EditError),

    /// Loro CRDT error.
    #[error("loro error: {0}")]
    Loro(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<loro::LoroError> for CrdtError {
    fn from(e: loro::LoroError) -> Self {
        CrdtError::Loro(e.to_string())
    }
}

impl From<serde_json::Error> for CrdtError {
    fn from(e: serde_json::Error) -> Self {
        CrdtError::Serialization(e.to_string())
    }
}
