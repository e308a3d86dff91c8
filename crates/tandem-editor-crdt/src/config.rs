//! Binding configuration.

use crate::awareness::SharedAwareness;
use crate::palette::UserPalette;
use crate::remote::RemoteUserDefaults;
use crate::undo::UndoConfig;

/// Whether a binding records local history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoSetting {
    Disabled,
    Enabled(UndoConfig),
}

impl Default for UndoSetting {
    fn default() -> Self {
        UndoSetting::Enabled(UndoConfig::default())
    }
}

/// Everything a [`CollabBinding`](crate::CollabBinding) needs besides the
/// document and the buffer.
#[derive(Clone, Default)]
pub struct CollabConfig {
    /// Presence channel. Without one no selections are published or drawn.
    pub awareness: Option<SharedAwareness>,
    pub undo: UndoSetting,
    /// Colours for attribution highlights.
    pub palette: UserPalette,
    pub remote_defaults: RemoteUserDefaults,
}

impl CollabConfig {
    pub fn with_awareness(mut self, awareness: SharedAwareness) -> Self {
        self.awareness = Some(awareness);
        self
    }

    pub fn with_undo(mut self, config: UndoConfig) -> Self {
        self.undo = UndoSetting::Enabled(config);
        self
    }

    pub fn without_undo(mut self) -> Self {
        self.undo = UndoSetting::Disabled;
        self
    }

    pub fn with_palette(mut self, palette: UserPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_remote_defaults(mut self, defaults: RemoteUserDefaults) -> Self {
        self.remote_defaults = defaults;
        self
    }
}

impl std::fmt::Debug for CollabConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollabConfig")
            .field("awareness", &self.awareness.is_some())
            .field("undo", &self.undo)
            .field("palette", &self.palette)
            .field("remote_defaults", &self.remote_defaults)
            .finish()
    }
}
