//! Decorations drawn over the buffer without changing its text.
//!
//! Remote selections and change attribution are both expressed as
//! [`Decoration`]s collected into a [`DecorationSet`]. The set is plain data:
//! a renderer walks it in order and paints marks, whole-line backgrounds and
//! inline widgets.

use smol_str::SmolStr;

use crate::change::ChangeSet;
use crate::types::Assoc;

/// What a decoration is for. Renderers map this to a CSS class.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub enum DecorationClass {
    /// Part of a remote participant's selection.
    Selection,
    /// A line fully covered by a remote selection.
    LineSelection,
    /// Text attributed to another participant's insertion.
    Inserted,
}

impl DecorationClass {
    pub fn css_class(self) -> &'static str {
        match self {
            DecorationClass::Selection => "tandem-selection",
            DecorationClass::LineSelection => "tandem-line-selection",
            DecorationClass::Inserted => "tandem-inserted",
        }
    }
}

/// Inline widget content.
///
/// Equality only looks at the kind and the color: a participant changing
/// their display name does not make an otherwise identical caret different.
#[derive(Clone, Debug)]
pub enum Widget {
    /// A remote caret with its name label.
    Caret { color: SmolStr, name: SmolStr },
    /// Marker for text another participant deleted.
    Deletion { color: SmolStr },
}

impl Widget {
    pub fn color(&self) -> &str {
        match self {
            Widget::Caret { color, .. } | Widget::Deletion { color } => color,
        }
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Widget::Caret { color: a, .. }, Widget::Caret { color: b, .. }) => a == b,
            (Widget::Deletion { color: a }, Widget::Deletion { color: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Widget {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoration {
    /// Background over `from..to`.
    Mark {
        from: usize,
        to: usize,
        class: DecorationClass,
        background: SmolStr,
    },
    /// Background over the whole line starting at `line_from`.
    LineMarker {
        line_from: usize,
        class: DecorationClass,
        background: SmolStr,
    },
    /// Widget at `pos`, drawn before or after text inserted there.
    Widget {
        pos: usize,
        side: Assoc,
        widget: Widget,
    },
}

impl Decoration {
    /// Offset the decoration starts at.
    pub fn from(&self) -> usize {
        match self {
            Decoration::Mark { from, .. } => *from,
            Decoration::LineMarker { line_from, .. } => *line_from,
            Decoration::Widget { pos, .. } => *pos,
        }
    }

    pub fn is_widget(&self) -> bool {
        matches!(self, Decoration::Widget { .. })
    }

    // Ordering among decorations starting at the same offset.
    fn rank(&self) -> u8 {
        match self {
            Decoration::LineMarker { .. } => 0,
            Decoration::Widget {
                side: Assoc::Before,
                ..
            } => 1,
            Decoration::Mark { .. } => 2,
            Decoration::Widget {
                side: Assoc::After,
                ..
            } => 3,
        }
    }

    /// Move the decoration through `changes`.
    ///
    /// Returns `None` for a mark whose text was deleted entirely.
    pub fn map(&self, changes: &ChangeSet) -> Option<Self> {
        match self {
            Decoration::Mark {
                from,
                to,
                class,
                background,
            } => {
                let from = changes.map_pos(*from, Assoc::After);
                let to = changes.map_pos(*to, Assoc::Before);
                (from < to).then(|| Decoration::Mark {
                    from,
                    to,
                    class: *class,
                    background: background.clone(),
                })
            }
            Decoration::LineMarker {
                line_from,
                class,
                background,
            } => Some(Decoration::LineMarker {
                line_from: changes.map_pos(*line_from, Assoc::Before),
                class: *class,
                background: background.clone(),
            }),
            Decoration::Widget { pos, side, widget } => Some(Decoration::Widget {
                pos: changes.map_pos(*pos, *side),
                side: *side,
                widget: widget.clone(),
            }),
        }
    }
}

/// Decorations in drawing order.
///
/// Sorted by start offset; at the same offset line markers come first, then
/// widgets biased before, then marks, then widgets biased after. Insertion
/// order breaks any remaining tie.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecorationSet {
    items: Vec<Decoration>,
}

impl DecorationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(mut items: Vec<Decoration>) -> Self {
        items.sort_by_key(|d| (d.from(), d.rank()));
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Decoration] {
        &self.items
    }

    /// Merge two sets, keeping drawing order.
    pub fn union(&self, other: &DecorationSet) -> Self {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        Self::from_vec(items)
    }

    /// Move every decoration through `changes`, dropping marks whose text
    /// is gone.
    pub fn map(&self, changes: &ChangeSet) -> Self {
        if changes.is_empty() {
            return self.clone();
        }
        Self::from_vec(self.items.iter().filter_map(|d| d.map(changes)).collect())
    }
}

impl FromIterator<Decoration> for DecorationSet {
    fn from_iter<I: IntoIterator<Item = Decoration>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DecorationSet {
    type Item = &'a Decoration;
    type IntoIter = std::slice::Iter<'a, Decoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
