//! Handle on the replicated text a binding is attached to.

use std::borrow::Cow;

use loro::{ContainerID, ContainerTrait, ExportMode, LoroDoc, LoroText, VersionVector};
use tandem_editor_core::Origin;

use crate::CrdtError;
use crate::delta::DocOp;

/// Root text container name used when none is given.
pub const DEFAULT_TEXT_NAME: &str = "content";

/// A `LoroDoc` together with the text container the editor mirrors.
///
/// Cloning is cheap and yields another handle on the same document.
#[derive(Clone)]
pub struct SharedText {
    doc: LoroDoc,
    text: LoroText,
}

impl SharedText {
    /// Create a new empty document with a root text container `name`.
    pub fn new(name: &str) -> Self {
        Self::with_doc(LoroDoc::new(), name)
    }

    /// Bind to the root text container `name` of an existing document.
    pub fn with_doc(doc: LoroDoc, name: &str) -> Self {
        let text = doc.get_text(name);
        Self { doc, text }
    }

    /// Create a document from an exported snapshot.
    pub fn from_snapshot(snapshot: &[u8], name: &str) -> Result<Self, CrdtError> {
        let doc = LoroDoc::new();
        doc.import(snapshot)?;
        Ok(Self::with_doc(doc, name))
    }

    /// Get the underlying Loro document.
    pub fn doc(&self) -> &LoroDoc {
        &self.doc
    }

    /// Get the text container.
    pub fn text(&self) -> &LoroText {
        &self.text
    }

    pub fn container_id(&self) -> ContainerID {
        self.text.id()
    }

    pub fn to_string(&self) -> String {
        self.text.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_unicode()
    }

    /// Get current version vector.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    /// Export full snapshot.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, CrdtError> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| CrdtError::Loro(e.to_string()))
    }

    /// Export updates since given version.
    pub fn export_updates_since(&self, version: &VersionVector) -> Option<Vec<u8>> {
        let current_vv = self.doc.oplog_vv();

        if *version == current_vv {
            return None;
        }

        let updates = self
            .doc
            .export(ExportMode::Updates {
                from: Cow::Owned(version.clone()),
            })
            .ok()?;

        if updates.is_empty() {
            return None;
        }

        Some(updates)
    }

    /// Import remote changes.
    pub fn import(&self, data: &[u8]) -> Result<(), CrdtError> {
        self.doc.import(data)?;
        Ok(())
    }

    /// Apply `ops` in order and commit them as one change tagged `origin`.
    ///
    /// Anything left uncommitted by other writers is committed first so it
    /// does not end up carrying our origin.
    pub fn apply_ops(&self, ops: &[DocOp], origin: &Origin) -> Result<(), CrdtError> {
        if ops.is_empty() {
            return Ok(());
        }
        self.doc.commit();

        for op in ops {
            match op {
                DocOp::Delete { pos, len } => self.text.delete(*pos, *len)?,
                DocOp::Insert { pos, text } => self.text.insert(*pos, text)?,
            }
        }

        self.doc.set_next_commit_origin(origin.as_str());
        self.doc.commit();
        Ok(())
    }
}

impl Default for SharedText {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_NAME)
    }
}

impl std::fmt::Debug for SharedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedText")
            .field("container", &self.container_id())
            .field("len", &self.len_chars())
            .finish()
    }
}
