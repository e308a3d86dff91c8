//! Collaborator colours.

use smol_str::SmolStr;

use crate::awareness::UserInfo;

/// A collaborator colour and the translucent variant used for selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserColor {
    pub color: &'static str,
    pub light: &'static str,
}

impl UserColor {
    pub const fn new(color: &'static str, light: &'static str) -> Self {
        Self { color, light }
    }
}

/// Predefined collaborator colours.
pub const DEFAULT_USER_COLORS: [UserColor; 8] = [
    UserColor::new("#30bced", "#30bced33"), // Blue
    UserColor::new("#6eeb83", "#6eeb8333"), // Green
    UserColor::new("#ffbc42", "#ffbc4233"), // Amber
    UserColor::new("#ecd444", "#ecd44433"), // Yellow
    UserColor::new("#ee6352", "#ee635233"), // Coral
    UserColor::new("#9ac2c9", "#9ac2c933"), // Slate
    UserColor::new("#8acb88", "#8acb8833"), // Sage
    UserColor::new("#1be7ff", "#1be7ff33"), // Cyan
];

/// Colour table handed to a binding through its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPalette {
    colors: &'static [UserColor],
}

impl UserPalette {
    /// Use `colors`, falling back to the default table if it is empty.
    pub fn new(colors: &'static [UserColor]) -> Self {
        if colors.is_empty() {
            return Self::default();
        }
        Self { colors }
    }

    pub fn colors(&self) -> &'static [UserColor] {
        self.colors
    }

    /// Pick a colour for `key` (a user name or client id).
    ///
    /// The same key always gets the same colour.
    pub fn color_for(&self, key: &str) -> UserColor {
        // FNV-1a, stable across runs and platforms.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in key.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        self.colors[(hash % self.colors.len() as u64) as usize]
    }

    /// Awareness `user` entry for `name`, coloured by `name`.
    pub fn user_info(&self, name: &str) -> UserInfo {
        let color = self.color_for(name);
        UserInfo {
            name: Some(SmolStr::new(name)),
            color: Some(SmolStr::new_static(color.color)),
            color_light: Some(SmolStr::new_static(color.light)),
        }
    }
}

impl Default for UserPalette {
    fn default() -> Self {
        Self {
            colors: &DEFAULT_USER_COLORS,
        }
    }
}
