//! Conversion between buffer offsets and document-stable positions.
//!
//! A [`RelativePosition`] wraps a Loro [`Cursor`], which is anchored to a
//! character's identity rather than its offset, so it keeps pointing at the
//! same place while other participants edit the text around it. Resolving a
//! position against a container other than the one it was created in fails
//! with [`CrdtError::ForeignPosition`].

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use loro::cursor::{Cursor, Side};
use loro::{ContainerID, LoroDoc, LoroText};
use serde::{Deserialize, Serialize};
use tandem_editor_core::{Assoc, Selection};

use crate::CrdtError;
use crate::document::SharedText;

/// A document-stable position plus the side it sticks to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RelativePositionJson", into = "RelativePositionJson")]
pub struct RelativePosition {
    cursor: Cursor,
    assoc: Assoc,
}

impl RelativePosition {
    pub fn assoc(&self) -> Assoc {
        self.assoc
    }

    /// Container the position was created in.
    pub fn container(&self) -> &ContainerID {
        &self.cursor.container
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.cursor.encode()
    }
}

impl PartialEq for RelativePosition {
    fn eq(&self, other: &Self) -> bool {
        self.assoc == other.assoc
            && self.cursor.id == other.cursor.id
            && self.cursor.container == other.cursor.container
    }
}

impl Eq for RelativePosition {}

// Wire form: the encoded cursor as base64 plus the signed assoc.
#[derive(Serialize, Deserialize)]
struct RelativePositionJson {
    cursor: String,
    assoc: i8,
}

impl From<RelativePosition> for RelativePositionJson {
    fn from(pos: RelativePosition) -> Self {
        Self {
            cursor: BASE64.encode(pos.cursor.encode()),
            assoc: pos.assoc.as_i8(),
        }
    }
}

impl TryFrom<RelativePositionJson> for RelativePosition {
    type Error = CrdtError;

    fn try_from(json: RelativePositionJson) -> Result<Self, Self::Error> {
        let bytes = BASE64
            .decode(json.cursor.as_bytes())
            .map_err(|e| CrdtError::Serialization(e.to_string()))?;
        let cursor = Cursor::decode(&bytes).map_err(|e| CrdtError::Serialization(e.to_string()))?;
        Ok(Self {
            cursor,
            assoc: Assoc::from_i8(json.assoc),
        })
    }
}

/// A resolved position: an offset valid against the current text only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbsolutePosition {
    pub offset: usize,
    pub assoc: Assoc,
}

/// A selection as a pair of relative positions. `head` is the focus end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeRange {
    pub anchor: RelativePosition,
    pub head: RelativePosition,
}

impl RelativeRange {
    pub fn to_json(&self) -> Result<serde_json::Value, CrdtError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, CrdtError> {
        Ok(Self::deserialize(value)?)
    }
}

/// Result of resolving a [`RelativeRange`].
///
/// When both ends land on the same offset the range is reported as a cursor
/// rather than an empty span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodedRange {
    Cursor(AbsolutePosition),
    Span {
        anchor: AbsolutePosition,
        head: AbsolutePosition,
    },
}

impl DecodedRange {
    pub fn anchor(&self) -> usize {
        match self {
            DecodedRange::Cursor(pos) => pos.offset,
            DecodedRange::Span { anchor, .. } => anchor.offset,
        }
    }

    pub fn head(&self) -> usize {
        match self {
            DecodedRange::Cursor(pos) => pos.offset,
            DecodedRange::Span { head, .. } => head.offset,
        }
    }

    pub fn to_selection(&self) -> Selection {
        match self {
            DecodedRange::Cursor(pos) => Selection::collapsed(pos.offset),
            DecodedRange::Span { anchor, head } => Selection::new(anchor.offset, head.offset),
        }
    }
}

/// Encodes and resolves positions for one text container.
#[derive(Clone)]
pub struct PositionCodec {
    doc: LoroDoc,
    text: LoroText,
    container: ContainerID,
}

impl PositionCodec {
    pub fn new(shared: &SharedText) -> Self {
        Self {
            doc: shared.doc().clone(),
            text: shared.text().clone(),
            container: shared.container_id(),
        }
    }

    pub fn container_id(&self) -> &ContainerID {
        &self.container
    }

    /// Anchor `offset` in the live text.
    ///
    /// `Before` sticks to the char left of the offset, so text inserted
    /// exactly there lands after the position. `After` sticks to the char
    /// at the offset and moves past such text.
    pub fn encode(&self, offset: usize, assoc: Assoc) -> Result<RelativePosition, CrdtError> {
        let len = self.text.len_unicode();
        let out_of_range = || {
            CrdtError::UnresolvablePosition(format!("offset {offset} outside text of {len} chars"))
        };
        if offset > len {
            return Err(out_of_range());
        }
        let cursor = self.text.get_cursor(offset, side_for(assoc)).ok_or_else(out_of_range)?;
        Ok(RelativePosition { cursor, assoc })
    }

    /// Resolve a position to its current offset.
    pub fn decode(&self, pos: &RelativePosition) -> Result<AbsolutePosition, CrdtError> {
        if pos.cursor.container != self.container {
            return Err(CrdtError::ForeignPosition {
                expected: self.container.to_string(),
                found: pos.cursor.container.to_string(),
            });
        }
        let result = self
            .doc
            .get_cursor_pos(&pos.cursor)
            .map_err(|e| CrdtError::UnresolvablePosition(format!("{e:?}")))?;
        Ok(AbsolutePosition {
            offset: result.current.pos.min(self.text.len_unicode()),
            assoc: pos.assoc,
        })
    }

    pub fn encode_range(
        &self,
        anchor: usize,
        head: usize,
        assoc: Assoc,
    ) -> Result<RelativeRange, CrdtError> {
        Ok(RelativeRange {
            anchor: self.encode(anchor, assoc)?,
            head: self.encode(head, assoc)?,
        })
    }

    pub fn encode_selection(&self, selection: Selection) -> Result<RelativeRange, CrdtError> {
        self.encode_range(selection.anchor, selection.head, Assoc::After)
    }

    pub fn decode_range(&self, range: &RelativeRange) -> Result<DecodedRange, CrdtError> {
        let anchor = self.decode(&range.anchor)?;
        let head = self.decode(&range.head)?;
        if anchor.offset == head.offset {
            Ok(DecodedRange::Cursor(head))
        } else {
            Ok(DecodedRange::Span { anchor, head })
        }
    }
}

fn side_for(assoc: Assoc) -> Side {
    match assoc {
        Assoc::Before => Side::Left,
        Assoc::After => Side::Right,
    }
}
