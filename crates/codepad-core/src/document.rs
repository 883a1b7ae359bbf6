//! Documents and tab management.
//!
//! ## Learning: Newtypes
//!
//! `DocumentId` wraps a `Uuid`, so a document ID can never be mixed up with
//! any other UUID or string in the API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

use codepad_syntax::detect_language;

use crate::code_input::{CodeInput, HighlightSettings};
use crate::event::EventBus;
use crate::{CoreError, CoreResult};

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new unique document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open tab: a file path and the buffer editing it.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,

    /// Where the document is saved; may not exist yet for new files
    path: PathBuf,

    /// Tab title
    name: String,

    input: CodeInput,

    /// Unsaved user edits
    modified: bool,
}

impl Document {
    /// Creates a document for a path that has not been written yet.
    pub fn untitled(
        path: impl AsRef<Path>,
        settings: &HighlightSettings,
        events: &EventBus,
    ) -> CoreResult<Self> {
        let path = path.as_ref();
        let id = DocumentId::new();
        let input = settings
            .build(detect_language(path))?
            .with_events(id, events.clone());

        Ok(Self {
            id,
            path: path.to_path_buf(),
            name: file_name(path),
            input,
            modified: false,
        })
    }

    /// Opens a document from a file and schedules its first highlight pass.
    pub fn from_file(
        path: impl AsRef<Path>,
        settings: &HighlightSettings,
        events: &EventBus,
    ) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let mut doc = Self::untitled(path, settings, events)?;
        doc.input.on_text_changed(content);
        Ok(doc)
    }

    // ==================== Getters ====================

    /// Returns the document ID.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the tab title.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the document has unsaved changes.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn input(&self) -> &CodeInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut CodeInput {
        &mut self.input
    }

    /// Returns the logical text.
    pub fn text(&self) -> &str {
        self.input.text()
    }

    // ==================== Editing ====================

    /// Replaces the text after a user edit.
    pub fn edit(&mut self, text: impl Into<String>) {
        self.input.on_text_changed(text);
        self.modified = true;
    }

    // ==================== File Operations ====================

    /// Saves the document's plain text to its path.
    pub fn save(&mut self) -> CoreResult<()> {
        let path = self.path.clone();
        self.save_as(path)
    }

    /// Saves the document to a new path.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        // Write to a uniquely named sibling, then rename over the target
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(self.input.text().as_bytes())?;
        temp.persist(path).map_err(|e| e.error)?;

        self.path = path.to_path_buf();
        self.name = file_name(path);
        self.modified = false;
        tracing::debug!("Saved {}", path.display());
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

/// Manages the open tabs.
#[derive(Debug, Default)]
pub struct DocumentManager {
    /// All open documents
    documents: HashMap<DocumentId, Document>,

    /// Tab order
    order: Vec<DocumentId>,

    /// Currently active document
    active: Option<DocumentId>,
}

impl DocumentManager {
    /// Creates a new document manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document and makes it active.
    pub fn add(&mut self, doc: Document) -> DocumentId {
        let id = doc.id();
        self.documents.insert(id, doc);
        self.order.push(id);
        self.active = Some(id);
        id
    }

    /// Removes a document.
    pub fn close(&mut self, id: DocumentId) -> CoreResult<()> {
        if self.documents.remove(&id).is_none() {
            return Err(CoreError::DocumentNotFound(id));
        }
        self.order.retain(|&i| i != id);

        if self.active == Some(id) {
            self.active = self.order.last().copied();
        }

        Ok(())
    }

    /// Closes every document.
    pub fn clear(&mut self) -> Vec<DocumentId> {
        self.documents.clear();
        self.active = None;
        std::mem::take(&mut self.order)
    }

    /// Returns a document by ID.
    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    /// Returns the active document.
    pub fn active(&self) -> Option<&Document> {
        self.active.and_then(|id| self.documents.get(&id))
    }

    /// Returns a mutable reference to the active document.
    pub fn active_mut(&mut self) -> Option<&mut Document> {
        self.active.and_then(|id| self.documents.get_mut(&id))
    }

    /// Sets the active document.
    pub fn set_active(&mut self, id: DocumentId) {
        if self.documents.contains_key(&id) {
            self.active = Some(id);
        }
    }

    /// Finds a document by path.
    pub fn find_by_path(&self, path: &Path) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|(_, doc)| doc.path() == path)
            .map(|(&id, _)| id)
    }

    /// Returns documents in tab order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.order.iter().filter_map(|id| self.documents.get(id))
    }

    /// Returns mutable documents in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }

    /// Returns true if no documents are open.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn untitled(path: &str) -> Document {
        Document::untitled(path, &HighlightSettings::default(), &EventBus::new()).unwrap()
    }

    #[test]
    fn test_from_file_schedules_highlight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.py");
        std::fs::write(&path, "print('hi')\n").unwrap();

        let doc = Document::from_file(&path, &HighlightSettings::default(), &EventBus::new()).unwrap();
        assert_eq!(doc.name(), "hello.py");
        assert_eq!(doc.text(), "print('hi')\n");
        assert!(!doc.is_modified());
        assert!(doc.input().next_deadline().is_some());
        assert_eq!(doc.input().highlighter().language(), "python");
    }

    #[test]
    fn test_non_python_file_uses_plain_lexer() {
        let doc = untitled("/tmp/notes.txt");
        assert_eq!(doc.input().highlighter().language(), "text");
    }

    #[test]
    fn test_save_writes_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");

        let mut doc = Document::untitled(&path, &HighlightSettings::default(), &EventBus::new()).unwrap();
        doc.edit("x = [1]\n");
        doc.input_mut().run_highlight_pass();
        assert!(doc.is_modified());

        doc.save().unwrap();
        assert!(!doc.is_modified());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = [1]\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_save_keeps_sibling_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.py");
        let sibling = dir.path().join("notes.tmp");
        std::fs::write(&sibling, "keep me").unwrap();

        let mut doc = Document::untitled(&path, &HighlightSettings::default(), &EventBus::new()).unwrap();
        doc.edit("print('saved')\n");
        doc.save().unwrap();

        assert_eq!(std::fs::read_to_string(&sibling).unwrap(), "keep me");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print('saved')\n");
    }

    #[test]
    fn test_save_as_renames_tab() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::untitled(dir.path().join("a.py"), &HighlightSettings::default(), &EventBus::new()).unwrap();
        doc.edit("pass\n");
        doc.save_as(dir.path().join("b.py")).unwrap();
        assert_eq!(doc.name(), "b.py");
        assert_eq!(doc.path(), dir.path().join("b.py"));
    }

    #[test]
    fn test_manager_order_and_active() {
        let mut docs = DocumentManager::new();
        let a = docs.add(untitled("/p/a.py"));
        let b = docs.add(untitled("/p/b.py"));
        assert_eq!(docs.active().unwrap().id(), b);

        docs.set_active(a);
        assert_eq!(docs.active().unwrap().id(), a);
        assert_eq!(docs.find_by_path(Path::new("/p/b.py")), Some(b));

        docs.close(a).unwrap();
        assert_eq!(docs.active().unwrap().id(), b);
        assert!(matches!(docs.close(a), Err(CoreError::DocumentNotFound(_))));

        assert_eq!(docs.clear(), vec![b]);
        assert!(docs.is_empty());
        assert!(docs.active().is_none());
    }
}
