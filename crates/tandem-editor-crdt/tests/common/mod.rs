//! Helpers shared by the integration tests.

#![allow(dead_code)]

use tandem_editor_crdt::{CollabBinding, CollabConfig, DEFAULT_TEXT_NAME, SharedText};
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary. Filter with
/// `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A binding on a fresh document holding `text`.
pub fn binding_with_text(text: &str, config: CollabConfig) -> CollabBinding {
    let shared = SharedText::default();
    if !text.is_empty() {
        shared.text().insert(0, text).unwrap();
        shared.doc().commit();
    }
    CollabBinding::open(shared, config).unwrap()
}

/// A second replica of `from`'s document, bound with `config`.
pub fn replica_of(from: &CollabBinding, config: CollabConfig) -> CollabBinding {
    let snapshot = from.shared_text().export_snapshot().unwrap();
    let shared = SharedText::from_snapshot(&snapshot, DEFAULT_TEXT_NAME).unwrap();
    CollabBinding::open(shared, config).unwrap()
}

/// Send everything `from` has that `to` lacks.
pub fn sync_into(from: &CollabBinding, to: &mut CollabBinding) {
    let version = to.shared_text().version();
    if let Some(updates) = from.shared_text().export_updates_since(&version) {
        to.import_update(&updates).unwrap();
    }
}

pub fn sync_both(a: &mut CollabBinding, b: &mut CollabBinding) {
    sync_into(a, b);
    sync_into(b, a);
}
