//! End-to-end behaviour of bindings exchanging document and awareness
//! updates.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{binding_with_text, init_tracing, replica_of, sync_both, sync_into};
use serde_json::json;
use tandem_editor_core::{Assoc, Decoration, DecorationClass, Selection, Transaction, Widget};
use tandem_editor_crdt::awareness::USER_FIELD;
use tandem_editor_crdt::{
    Awareness, AwarenessUpdate, CollabBinding, CollabConfig, CrdtError, LoroDoc, PositionCodec,
    SharedAwareness, SharedText, UndoConfig, UserPalette,
};

fn relay(from: &SharedAwareness, to: &SharedAwareness) {
    let data = {
        let from = from.borrow();
        from.encode_update(&[from.client_id()]).unwrap()
    };
    to.borrow_mut().apply_encoded_update(&data).unwrap();
}

fn caret(pos: usize, side: Assoc) -> Decoration {
    Decoration::Widget {
        pos,
        side,
        widget: Widget::Caret {
            color: "#30bced".into(),
            name: "Anonymous".into(),
        },
    }
}

fn mark(from: usize, to: usize) -> Decoration {
    Decoration::Mark {
        from,
        to,
        class: DecorationClass::Selection,
        background: "#30bced33".into(),
    }
}

#[test]
fn local_edit_commits_once_without_echo() {
    init_tracing();
    let mut binding = binding_with_text("", CollabConfig::default());

    let commits = Arc::new(AtomicUsize::new(0));
    let counter = commits.clone();
    let _subscription = binding
        .shared_text()
        .doc()
        .subscribe_local_update(Box::new(move |_update| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));

    let update = binding.dispatch(Transaction::insert(0, "hello")).unwrap();
    assert_eq!(commits.load(Ordering::SeqCst), 1);
    assert_eq!(binding.shared_text().to_string(), "hello");

    // The document notification for that commit changes nothing.
    assert!(!binding.refresh().unwrap());
    assert_eq!(binding.editor().text(), "hello");
    assert_eq!(binding.editor().selection(), update.selection_after);
    assert_eq!(commits.load(Ordering::SeqCst), 1);
}

#[test]
fn undo_restores_selection_before_typing() {
    init_tracing();
    let mut binding = binding_with_text("abcdef", CollabConfig::default());
    binding
        .dispatch(Transaction::select(Selection::collapsed(2)))
        .unwrap();

    let tx = binding.editor().replace_selection("hello");
    binding.dispatch(tx).unwrap();
    assert_eq!(binding.editor().text(), "abhellocdef");
    assert_eq!(binding.editor().selection(), Selection::collapsed(7));

    assert!(binding.undo().unwrap());
    assert_eq!(binding.editor().text(), "abcdef");
    assert_eq!(binding.editor().selection(), Selection::collapsed(2));

    assert!(binding.redo().unwrap());
    assert_eq!(binding.editor().text(), "abhellocdef");
    assert_eq!(binding.editor().selection(), Selection::collapsed(7));
}

#[test]
fn undo_leaves_remote_edits_alone() {
    init_tracing();
    let mut a = binding_with_text("shared ", CollabConfig::default());
    let mut b = replica_of(&a, CollabConfig::default());

    a.dispatch(Transaction::insert(7, "mine")).unwrap();
    sync_both(&mut a, &mut b);
    b.dispatch(Transaction::insert(0, ">> ")).unwrap();
    sync_both(&mut a, &mut b);
    assert_eq!(a.editor().text(), ">> shared mine");

    assert!(a.undo().unwrap());
    assert_eq!(a.editor().text(), ">> shared ");
    assert!(!a.undo().unwrap());

    sync_into(&a, &mut b);
    assert_eq!(b.editor().text(), ">> shared ");
}

#[test]
fn multi_line_remote_selection() {
    init_tracing();
    let aw_a = Awareness::shared(1);
    let aw_b = Awareness::shared(2);
    let mut a = binding_with_text(
        "first\nsecond\nthird",
        CollabConfig::default().with_awareness(aw_a.clone()),
    );
    let mut b = replica_of(&a, CollabConfig::default().with_awareness(aw_b.clone()));

    // Line 1 column 2 to line 3 column 1.
    b.dispatch(Transaction::select(Selection::new(2, 14))).unwrap();
    relay(&aw_b, &aw_a);
    assert!(a.refresh().unwrap());

    assert_eq!(
        a.decorations().as_slice(),
        &[
            mark(2, 5),
            Decoration::LineMarker {
                line_from: 6,
                class: DecorationClass::LineSelection,
                background: "#30bced33".into(),
            },
            mark(13, 14),
            caret(14, Assoc::Before),
        ]
    );

    // Nothing changed since, so nothing to redraw.
    assert!(!a.refresh().unwrap());
}

#[test]
fn remote_caret_follows_local_edits() {
    init_tracing();
    let aw_a = Awareness::shared(1);
    let aw_b = Awareness::shared(2);
    let mut a = binding_with_text(
        "hello world",
        CollabConfig::default().with_awareness(aw_a.clone()),
    );
    let mut b = replica_of(&a, CollabConfig::default().with_awareness(aw_b.clone()));

    b.dispatch(Transaction::select(Selection::collapsed(6))).unwrap();
    relay(&aw_b, &aw_a);
    a.refresh().unwrap();
    assert_eq!(a.decorations().as_slice(), &[caret(6, Assoc::After)]);

    a.dispatch(Transaction::insert(0, ">> ")).unwrap();
    assert_eq!(a.decorations().as_slice(), &[caret(9, Assoc::After)]);
}

#[test]
fn remote_caret_moves_past_text_typed_at_it() {
    init_tracing();
    let aw_a = Awareness::shared(1);
    let aw_b = Awareness::shared(2);
    let mut a = binding_with_text(
        "abcdef",
        CollabConfig::default().with_awareness(aw_a.clone()),
    );
    let mut b = replica_of(&a, CollabConfig::default().with_awareness(aw_b.clone()));

    b.dispatch(Transaction::select(Selection::collapsed(3))).unwrap();
    relay(&aw_b, &aw_a);
    a.refresh().unwrap();
    assert_eq!(a.decorations().as_slice(), &[caret(3, Assoc::After)]);

    a.dispatch(Transaction::insert(3, "XYZ")).unwrap();
    assert_eq!(a.editor().text(), "abcXYZdef");
    assert_eq!(a.decorations().as_slice(), &[caret(6, Assoc::After)]);
}

#[test]
fn bindings_on_one_document_never_undo_each_other() {
    init_tracing();
    let doc = LoroDoc::new();
    let essay = SharedText::with_doc(doc.clone(), "a");
    let mut a = CollabBinding::open(essay, CollabConfig::default()).unwrap();
    let notes = SharedText::with_doc(doc.clone(), "b");
    assert!(matches!(
        CollabBinding::open(notes.clone(), CollabConfig::default()),
        Err(CrdtError::HistoryInUse)
    ));
    let mut b = CollabBinding::open(notes, CollabConfig::default().without_undo()).unwrap();

    a.dispatch(Transaction::insert(0, "alpha")).unwrap();
    b.dispatch(Transaction::insert(0, "beta")).unwrap();

    assert!(!a.can_undo());
    assert!(!a.undo().unwrap());
    assert_eq!(a.shared_text().to_string(), "alpha");
    assert_eq!(b.shared_text().to_string(), "beta");
    assert_eq!(b.editor().text(), "beta");

    a.dispatch(Transaction::insert(5, "!")).unwrap();
    assert!(a.undo().unwrap());
    assert_eq!(a.editor().text(), "alpha");
    assert_eq!(b.shared_text().to_string(), "beta");
}

#[test]
fn long_session_history_stays_bounded() {
    init_tracing();
    let config = CollabConfig::default().with_undo(UndoConfig {
        max_undo_steps: 10,
        ..UndoConfig::default()
    });
    let mut binding = binding_with_text("", config);
    for _ in 0..200 {
        let tx = binding.editor().replace_selection("x");
        binding.dispatch(tx).unwrap();
    }
    assert_eq!(binding.undo_depth(), 10);

    while binding.undo().unwrap() {}
    assert_eq!(binding.editor().text().len(), 190);
    assert_eq!(binding.editor().selection(), Selection::collapsed(190));
    assert_eq!((binding.undo_depth(), binding.redo_depth()), (0, 10));
}

#[test]
fn published_user_info_colors_the_caret() {
    init_tracing();
    let aw_a = Awareness::shared(1);
    let aw_b = Awareness::shared(2);
    let mut a = binding_with_text("abc", CollabConfig::default().with_awareness(aw_a.clone()));
    let mut b = replica_of(&a, CollabConfig::default().with_awareness(aw_b.clone()));

    let user = UserPalette::default().user_info("bob");
    aw_b
        .borrow_mut()
        .set_local_state_field(USER_FIELD, user.to_value().unwrap());
    b.dispatch(Transaction::select(Selection::new(0, 2))).unwrap();
    relay(&aw_b, &aw_a);
    a.refresh().unwrap();

    let color = UserPalette::default().color_for("bob");
    let decorations = a.decorations();
    assert_eq!(decorations.len(), 2);
    assert_eq!(
        decorations.as_slice()[0],
        Decoration::Mark {
            from: 0,
            to: 2,
            class: DecorationClass::Selection,
            background: color.light.into(),
        }
    );
    match &decorations.as_slice()[1] {
        Decoration::Widget {
            pos: 2,
            widget: Widget::Caret { color: c, name },
            ..
        } => {
            assert_eq!(c, color.color);
            assert_eq!(name, "bob");
        }
        other => panic!("expected caret, got {other:?}"),
    }
}

#[test]
fn foreign_and_missing_cursors_are_skipped() {
    init_tracing();
    let awareness = Awareness::shared(1);
    let mut binding = binding_with_text(
        "hello",
        CollabConfig::default().with_awareness(awareness.clone()),
    );

    let other = SharedText::new("elsewhere");
    other.text().insert(0, "abc").unwrap();
    other.doc().commit();
    let foreign = PositionCodec::new(&other)
        .encode_selection(Selection::new(0, 1))
        .unwrap();

    let mut aw = awareness.borrow_mut();
    aw.apply_update(AwarenessUpdate {
        client_id: 2,
        state: Some(json!({ "cursor": foreign.to_json().unwrap() })),
        clock: 1,
    });
    aw.apply_update(AwarenessUpdate {
        client_id: 3,
        state: Some(json!({ "user": { "name": "idle" } })),
        clock: 1,
    });
    drop(aw);

    binding.refresh().unwrap();
    assert!(binding.decorations().is_empty());
}

#[test]
fn disabled_features_stay_out_of_the_way() {
    init_tracing();
    let config = CollabConfig::default().without_undo();
    let mut a = binding_with_text("text", config.clone());
    let mut b = replica_of(&a, config);

    a.dispatch(Transaction::insert(4, "!")).unwrap();
    sync_into(&a, &mut b);
    assert_eq!(b.editor().text(), "text!");

    assert!(!a.can_undo());
    assert!(!a.undo().unwrap());
    assert!(!a.redo().unwrap());
    assert!(a.decorations().is_empty());
    assert_eq!(a.editor().text(), "text!");
}

#[test]
fn destroy_is_idempotent_and_detaches() {
    init_tracing();
    let awareness = Awareness::shared(1);
    let mut a = binding_with_text(
        "abc",
        CollabConfig::default().with_awareness(awareness.clone()),
    );
    let mut b = replica_of(&a, CollabConfig::default());

    a.destroy();
    a.destroy();
    assert!(a.is_destroyed());
    assert!(a.decorations().is_empty());

    b.dispatch(Transaction::insert(0, "x")).unwrap();
    let updates = b
        .shared_text()
        .export_updates_since(&a.shared_text().version())
        .unwrap();
    assert!(a.import_update(&updates).is_err());
    assert!(a.undo().is_err());

    // The document still takes updates; the buffer no longer follows.
    a.shared_text().import(&updates).unwrap();
    assert_eq!(a.shared_text().to_string(), "xabc");
    assert_eq!(a.editor().text(), "abc");

    // The awareness observer is gone too.
    awareness.borrow_mut().apply_update(AwarenessUpdate {
        client_id: 2,
        state: Some(json!({})),
        clock: 1,
    });
    assert!(a.decorations().is_empty());
}
