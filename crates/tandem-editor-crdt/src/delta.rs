//! Translation between document deltas and buffer edits.
//!
//! Loro describes a text change as a sequence of retain/insert/delete
//! segments walked left to right over the old text. The buffer takes a batch
//! of edits all expressed against the pre-batch text. The two functions
//! here convert in each direction.

use loro::{LoroValue, TextDelta};
use smol_str::SmolStr;
use tandem_editor_core::{BufferEdit, ChangeSet};

use crate::CrdtError;

/// Rich-text attribute carrying the users a span is attributed to.
pub const ATTRIBUTION_KEY: &str = "attribution";

/// Users a span of text is attributed to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attribution {
    pub users: Vec<SmolStr>,
}

impl Attribution {
    /// Read the attribution attribute, which is either a single user or a
    /// list of users.
    pub fn from_value(value: &LoroValue) -> Option<Self> {
        let users: Vec<SmolStr> = match value {
            LoroValue::String(user) => vec![SmolStr::new(user.as_str())],
            LoroValue::List(list) => list
                .iter()
                .filter_map(|v| match v {
                    LoroValue::String(user) => Some(SmolStr::new(user.as_str())),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        (!users.is_empty()).then_some(Self { users })
    }

    /// First attributed user, used to pick a color.
    pub fn primary(&self) -> Option<&str> {
        self.users.first().map(SmolStr::as_str)
    }
}

/// One segment of a change description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeltaSegment {
    Insert {
        text: SmolStr,
        attribution: Option<Attribution>,
    },
    Retain {
        len: usize,
        attribution: Option<Attribution>,
    },
    Delete {
        len: usize,
        attribution: Option<Attribution>,
    },
}

impl DeltaSegment {
    pub fn insert(text: impl Into<SmolStr>) -> Self {
        DeltaSegment::Insert {
            text: text.into(),
            attribution: None,
        }
    }

    pub fn retain(len: usize) -> Self {
        DeltaSegment::Retain {
            len,
            attribution: None,
        }
    }

    pub fn delete(len: usize) -> Self {
        DeltaSegment::Delete {
            len,
            attribution: None,
        }
    }

    pub fn attribution(&self) -> Option<&Attribution> {
        match self {
            DeltaSegment::Insert { attribution, .. }
            | DeltaSegment::Retain { attribution, .. }
            | DeltaSegment::Delete { attribution, .. } => attribution.as_ref(),
        }
    }

    /// Convert a Loro text delta.
    pub fn from_loro(delta: &TextDelta) -> Self {
        match delta {
            TextDelta::Retain { retain, attributes } => DeltaSegment::Retain {
                len: *retain,
                attribution: attributes
                    .as_ref()
                    .and_then(|a| a.get(ATTRIBUTION_KEY))
                    .and_then(Attribution::from_value),
            },
            TextDelta::Insert { insert, attributes } => DeltaSegment::Insert {
                text: SmolStr::new(insert),
                attribution: attributes
                    .as_ref()
                    .and_then(|a| a.get(ATTRIBUTION_KEY))
                    .and_then(Attribution::from_value),
            },
            TextDelta::Delete { delete } => DeltaSegment::Delete {
                len: *delete,
                attribution: None,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributionKind {
    Inserted,
    Deleted,
}

/// Attributed span in post-change offsets. Deleted spans are zero-width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributionRange {
    pub from: usize,
    pub to: usize,
    pub kind: AttributionKind,
    pub attribution: Attribution,
}

/// Buffer edits for one delta, plus any attributed spans it carried.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslatedDelta {
    /// Edits in pre-change offsets.
    pub edits: Vec<BufferEdit>,
    pub attributions: Vec<AttributionRange>,
}

impl TranslatedDelta {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.attributions.is_empty()
    }
}

/// Translate segments into buffer edits against a buffer of `buffer_len`
/// chars.
///
/// `pos` walks the old text: retains and deletes advance it, inserts do
/// not, since every edit in the batch is expressed against the old text.
/// `post` walks the new text for attribution ranges.
pub fn to_buffer_edits(
    segments: &[DeltaSegment],
    buffer_len: usize,
) -> Result<TranslatedDelta, CrdtError> {
    let mut out = TranslatedDelta::default();
    let mut pos = 0usize;
    let mut post = 0usize;

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            // attributes on retained text are formatting, not authorship
            DeltaSegment::Retain { len, .. } => {
                check_span(i, "retain", pos, *len, buffer_len)?;
                pos += len;
                post += len;
            }
            DeltaSegment::Insert { text, attribution } => {
                let len = text.chars().count();
                if len == 0 {
                    return Err(CrdtError::MalformedDelta(format!(
                        "segment {i}: empty insert"
                    )));
                }
                out.edits.push(BufferEdit::insert(pos, text.clone()));
                if let Some(attribution) = attribution {
                    out.attributions.push(AttributionRange {
                        from: post,
                        to: post + len,
                        kind: AttributionKind::Inserted,
                        attribution: attribution.clone(),
                    });
                }
                post += len;
            }
            DeltaSegment::Delete { len, attribution } => {
                check_span(i, "delete", pos, *len, buffer_len)?;
                out.edits.push(BufferEdit::delete(pos, pos + len));
                if let Some(attribution) = attribution {
                    out.attributions.push(AttributionRange {
                        from: post,
                        to: post,
                        kind: AttributionKind::Deleted,
                        attribution: attribution.clone(),
                    });
                }
                pos += len;
            }
        }
    }

    Ok(out)
}

fn check_span(
    index: usize,
    kind: &str,
    pos: usize,
    len: usize,
    buffer_len: usize,
) -> Result<(), CrdtError> {
    if len == 0 {
        return Err(CrdtError::MalformedDelta(format!(
            "segment {index}: zero-length {kind}"
        )));
    }
    if pos + len > buffer_len {
        return Err(CrdtError::MalformedDelta(format!(
            "segment {index}: {kind} of {len} at {pos} runs past the end of a {buffer_len} char buffer"
        )));
    }
    Ok(())
}

/// A single document operation, in document offsets at the time it is
/// applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocOp {
    Delete { pos: usize, len: usize },
    Insert { pos: usize, text: SmolStr },
}

/// Translate a buffer change batch into sequential document operations.
///
/// The batch reports every change against the pre-batch buffer, while each
/// document operation sees the text as left by the previous one, so
/// positions are shifted by the net length change of everything before.
pub fn to_doc_ops(changes: &ChangeSet) -> Vec<DocOp> {
    let mut ops = Vec::new();
    let mut adj: isize = 0;

    for change in changes.iter() {
        let pos = (change.from_a as isize + adj) as usize;
        let deleted = change.deleted_len();
        if deleted > 0 {
            ops.push(DocOp::Delete { pos, len: deleted });
        }
        if !change.inserted.is_empty() {
            ops.push(DocOp::Insert {
                pos,
                text: change.inserted.clone(),
            });
        }
        adj += change.inserted_len() as isize - deleted as isize;
    }

    ops
}

/// The same batch as a retain/delete/insert sequence over the old text.
pub fn to_delta_segments(changes: &ChangeSet) -> Vec<DeltaSegment> {
    let mut segments = Vec::new();
    let mut pos = 0usize;

    for change in changes.iter() {
        if change.from_a > pos {
            segments.push(DeltaSegment::retain(change.from_a - pos));
        }
        if change.deleted_len() > 0 {
            segments.push(DeltaSegment::delete(change.deleted_len()));
        }
        if !change.inserted.is_empty() {
            segments.push(DeltaSegment::insert(change.inserted.clone()));
        }
        pos = change.to_a;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tandem_editor_core::{EditorRope, TextBuffer};

    fn attributed(user: &str) -> Option<Attribution> {
        Some(Attribution {
            users: vec![user.into()],
        })
    }

    #[test]
    fn test_adjustment_example() {
        let changes = ChangeSet::from_edits(
            &[BufferEdit::new(0, 3, "ab"), BufferEdit::insert(5, "xyz")],
            10,
        )
        .unwrap();

        assert_eq!(
            to_doc_ops(&changes),
            vec![
                DocOp::Delete { pos: 0, len: 3 },
                DocOp::Insert {
                    pos: 0,
                    text: "ab".into()
                },
                DocOp::Insert {
                    pos: 4,
                    text: "xyz".into()
                },
            ]
        );
    }

    #[test]
    fn test_segments_to_edits() {
        // "0123456789": keep 2, delete 3, insert "ab", keep 1, insert "Z"
        let segments = vec![
            DeltaSegment::retain(2),
            DeltaSegment::delete(3),
            DeltaSegment::insert("ab"),
            DeltaSegment::retain(1),
            DeltaSegment::insert("Z"),
        ];
        let translated = to_buffer_edits(&segments, 10).unwrap();
        assert_eq!(
            translated.edits,
            vec![
                BufferEdit::delete(2, 5),
                BufferEdit::insert(5, "ab"),
                BufferEdit::insert(6, "Z"),
            ]
        );

        let mut rope = EditorRope::from_str("0123456789");
        ChangeSet::from_edits(&translated.edits, 10)
            .unwrap()
            .apply(&mut rope);
        assert_eq!(rope.to_string(), "01ab5Z6789");
    }

    #[test]
    fn test_attribution_in_post_change_offsets() {
        let segments = vec![
            DeltaSegment::retain(1),
            DeltaSegment::Delete {
                len: 2,
                attribution: attributed("bob"),
            },
            DeltaSegment::Insert {
                text: "xyz".into(),
                attribution: attributed("alice"),
            },
        ];
        let translated = to_buffer_edits(&segments, 5).unwrap();
        assert_eq!(
            translated.attributions,
            vec![
                AttributionRange {
                    from: 1,
                    to: 1,
                    kind: AttributionKind::Deleted,
                    attribution: Attribution {
                        users: vec!["bob".into()]
                    },
                },
                AttributionRange {
                    from: 1,
                    to: 4,
                    kind: AttributionKind::Inserted,
                    attribution: Attribution {
                        users: vec!["alice".into()]
                    },
                },
            ]
        );
    }

    #[test]
    fn test_attributed_retain_is_not_an_insert() {
        let segments = vec![
            DeltaSegment::Retain {
                len: 3,
                attribution: attributed("carol"),
            },
            DeltaSegment::Insert {
                text: "!".into(),
                attribution: attributed("dave"),
            },
        ];
        let translated = to_buffer_edits(&segments, 3).unwrap();
        assert_eq!(translated.edits, vec![BufferEdit::insert(3, "!")]);
        assert_eq!(translated.attributions.len(), 1);
        assert_eq!(translated.attributions[0].from, 3);
        assert_eq!(translated.attributions[0].to, 4);
        assert_eq!(translated.attributions[0].attribution.primary(), Some("dave"));
    }

    #[test]
    fn test_pure_retain_is_empty() {
        let translated = to_buffer_edits(&[DeltaSegment::retain(4)], 4).unwrap();
        assert!(translated.is_empty());
        assert!(to_buffer_edits(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_segments() {
        assert!(matches!(
            to_buffer_edits(&[DeltaSegment::retain(3), DeltaSegment::delete(3)], 5),
            Err(CrdtError::MalformedDelta(_))
        ));
        assert!(matches!(
            to_buffer_edits(&[DeltaSegment::retain(0)], 5),
            Err(CrdtError::MalformedDelta(_))
        ));
        assert!(matches!(
            to_buffer_edits(&[DeltaSegment::insert("")], 5),
            Err(CrdtError::MalformedDelta(_))
        ));
    }

    #[test]
    fn test_to_delta_segments() {
        let changes = ChangeSet::from_edits(
            &[BufferEdit::new(0, 3, "ab"), BufferEdit::insert(5, "xyz")],
            10,
        )
        .unwrap();
        assert_eq!(
            to_delta_segments(&changes),
            vec![
                DeltaSegment::delete(3),
                DeltaSegment::insert("ab"),
                DeltaSegment::retain(2),
                DeltaSegment::insert("xyz"),
            ]
        );
    }

    #[test]
    fn test_attribution_value_forms() {
        let single = LoroValue::from("alice");
        assert_eq!(Attribution::from_value(&single), attributed("alice"));

        let list = LoroValue::from(vec![LoroValue::from("a"), LoroValue::from("b")]);
        let attribution = Attribution::from_value(&list).unwrap();
        assert_eq!(attribution.primary(), Some("a"));
        assert_eq!(attribution.users.len(), 2);

        assert_eq!(Attribution::from_value(&LoroValue::I64(3)), None);
    }

    fn batch_strategy() -> impl Strategy<Value = (String, Vec<BufferEdit>)> {
        "[a-z]{0,20}".prop_flat_map(|text| {
            let len = text.chars().count();
            let cuts = prop::collection::vec((0..=len, 0..=3usize, "[A-Z]{0,3}"), 0..5);
            (Just(text), cuts)
        })
        .prop_map(|(text, cuts)| {
            let len = text.chars().count();
            let mut cuts: Vec<_> = cuts
                .into_iter()
                .map(|(from, del, ins)| (from, (from + del).min(len), ins))
                .collect();
            cuts.sort_by_key(|c| c.0);
            let mut edits = Vec::new();
            let mut last_end = 0;
            for (from, to, insert) in cuts {
                if from < last_end {
                    continue;
                }
                last_end = to;
                edits.push(BufferEdit::new(from, to, insert));
            }
            (text, edits)
        })
    }

    fn apply_sequentially(text: &str, ops: &[DocOp]) -> String {
        let mut chars: Vec<char> = text.chars().collect();
        for op in ops {
            match op {
                DocOp::Delete { pos, len } => {
                    chars.drain(*pos..*pos + *len);
                }
                DocOp::Insert { pos, text } => {
                    chars.splice(*pos..*pos, text.chars());
                }
            }
        }
        chars.into_iter().collect()
    }

    proptest! {
        #[test]
        fn doc_ops_match_batch_application((text, edits) in batch_strategy()) {
            let len = text.chars().count();
            let changes = ChangeSet::from_edits(&edits, len).unwrap();

            let mut rope = EditorRope::from_str(&text);
            changes.apply(&mut rope);

            let ops = to_doc_ops(&changes);
            prop_assert_eq!(apply_sequentially(&text, &ops), rope.to_string());
        }

        #[test]
        fn segments_round_trip_through_edits((text, edits) in batch_strategy()) {
            let len = text.chars().count();
            let changes = ChangeSet::from_edits(&edits, len).unwrap();
            let segments = to_delta_segments(&changes);

            let translated = to_buffer_edits(&segments, len).unwrap();
            let again = ChangeSet::from_edits(&translated.edits, len).unwrap();

            let mut expected = EditorRope::from_str(&text);
            changes.apply(&mut expected);
            let mut actual = EditorRope::from_str(&text);
            again.apply(&mut actual);
            prop_assert_eq!(actual.to_string(), expected.to_string());
        }
    }
}
