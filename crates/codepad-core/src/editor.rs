//! Main editor orchestration.
//!
//! ## Learning: The Facade Pattern
//!
//! `Editor` gives the shell one entry point for project, tab, highlighting
//! and tool operations; callers never touch `DocumentManager` or `Config`
//! directly.

use std::path::{Path, PathBuf};

use tokio::time::Instant;

use crate::code_input::HighlightSettings;
use crate::config::Config;
use crate::document::{Document, DocumentId, DocumentManager};
use crate::event::{EditorEvent, EventBus};
use crate::tools::{self, Git, Pip, ToolOutput};
use crate::{CoreError, CoreResult};

/// The main editor state.
///
/// Owned by a single thread. Highlighting deadlines are driven by calling
/// [`Editor::poll_highlights`] from the event loop.
pub struct Editor {
    /// Open tabs
    documents: DocumentManager,

    /// Editor configuration
    config: Config,

    /// Where the configuration is persisted; `None` uses the default path
    config_path: Option<PathBuf>,

    /// Style and timing for new documents
    settings: HighlightSettings,

    /// Event bus for notifications
    event_bus: EventBus,
}

impl Editor {
    /// Creates an editor; fails if the configured theme cannot be resolved.
    pub fn new(config: Config) -> CoreResult<Self> {
        let settings = HighlightSettings::from_config(&config.editor)?;
        Ok(Self {
            documents: DocumentManager::new(),
            config,
            config_path: None,
            settings,
            event_bus: EventBus::new(),
        })
    }

    /// Persists configuration to `path` instead of the default location.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    // ==================== Project ====================

    /// Returns the project folder.
    pub fn project(&self) -> Option<&Path> {
        self.config.project_path.as_deref()
    }

    /// Switches to a project folder, remembers it and closes all tabs.
    pub fn set_project(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(CoreError::NotADirectory(path.to_path_buf()));
        }

        let mut config = self.config.clone();
        config.project_path = Some(path.to_path_buf());
        self.persist_config(&config)?;
        self.config = config;

        for id in self.documents.clear() {
            self.emit(EditorEvent::DocumentClosed(id));
        }
        tracing::info!("Project folder set to {}", path.display());
        self.emit(EditorEvent::ProjectChanged(path.to_path_buf()));
        Ok(())
    }

    fn persist_config(&self, config: &Config) -> CoreResult<()> {
        match &self.config_path {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        Ok(())
    }

    // ==================== Document Operations ====================

    /// Opens a new `untitled-N.py` tab in the project folder.
    pub fn new_file(&mut self) -> CoreResult<DocumentId> {
        let project = self.project().ok_or(CoreError::NoProject)?;

        let mut n = 1;
        let path = loop {
            let candidate = project.join(format!("untitled-{n}.py"));
            if !candidate.exists() && self.documents.find_by_path(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };

        let doc = Document::untitled(&path, &self.settings, &self.event_bus)?;
        Ok(self.add_document(doc))
    }

    /// Opens a file, or focuses its tab if it is already open.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> CoreResult<DocumentId> {
        let path = path.as_ref();

        if let Some(id) = self.documents.find_by_path(path) {
            self.documents.set_active(id);
            self.emit(EditorEvent::DocumentFocused(id));
            return Ok(id);
        }

        if !path.is_file() {
            return Err(CoreError::FileNotFound(path.to_path_buf()));
        }

        let doc = Document::from_file(path, &self.settings, &self.event_bus)?;
        Ok(self.add_document(doc))
    }

    fn add_document(&mut self, doc: Document) -> DocumentId {
        let id = self.documents.add(doc);
        self.emit(EditorEvent::DocumentOpened(id));
        self.emit(EditorEvent::DocumentFocused(id));
        id
    }

    /// Focuses a tab.
    pub fn focus(&mut self, id: DocumentId) -> CoreResult<()> {
        if self.documents.get(id).is_none() {
            return Err(CoreError::DocumentNotFound(id));
        }
        self.documents.set_active(id);
        self.emit(EditorEvent::DocumentFocused(id));
        Ok(())
    }

    /// Closes a document.
    pub fn close_document(&mut self, id: DocumentId) -> CoreResult<()> {
        self.documents.close(id)?;
        self.emit(EditorEvent::DocumentClosed(id));
        Ok(())
    }

    /// Saves the active document and returns its path.
    pub fn save_current(&mut self) -> CoreResult<PathBuf> {
        let doc = self.active_document_mut()?;
        doc.save()?;
        let (id, path) = (doc.id(), doc.path().to_path_buf());
        self.emit(EditorEvent::DocumentSaved(id));
        Ok(path)
    }

    /// Returns the active document.
    pub fn active_document(&self) -> CoreResult<&Document> {
        self.documents.active().ok_or(CoreError::NoActiveDocument)
    }

    /// Returns a mutable reference to the active document.
    pub fn active_document_mut(&mut self) -> CoreResult<&mut Document> {
        self.documents
            .active_mut()
            .ok_or(CoreError::NoActiveDocument)
    }

    /// Returns a document by ID.
    pub fn document(&self, id: DocumentId) -> CoreResult<&Document> {
        self.documents
            .get(id)
            .ok_or(CoreError::DocumentNotFound(id))
    }

    /// Returns open documents in tab order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    // ==================== Editing & Highlighting ====================

    /// Replaces the active document's text after a user edit.
    pub fn edit_active(&mut self, text: impl Into<String>) -> CoreResult<()> {
        self.active_document_mut()?.edit(text);
        Ok(())
    }

    /// Moves the active document's caret.
    pub fn set_caret(&mut self, caret: usize) -> CoreResult<()> {
        self.active_document_mut()?.input_mut().set_caret(caret);
        Ok(())
    }

    /// Runs every highlight pass that is due. Returns how many ran.
    pub fn poll_highlights(&mut self, now: Instant) -> usize {
        self.documents
            .iter_mut()
            .map(|doc| doc.input_mut().poll(now))
            .filter(|&ran| ran)
            .count()
    }

    /// Earliest pending highlight deadline across all tabs.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.documents
            .iter()
            .filter_map(|doc| doc.input().next_deadline())
            .min()
    }

    // ==================== Tools ====================

    /// Saves the active document and runs it with the configured interpreter.
    pub async fn run_current(&mut self) -> CoreResult<ToolOutput> {
        let path = self.save_current()?;
        let output =
            tools::run_script(&self.config.editor.python, &path, tools::SCRIPT_TIMEOUT).await?;
        Ok(output)
    }

    /// Pip runner using the configured interpreter.
    pub fn pip(&self) -> Pip {
        Pip::new(self.config.editor.python.clone())
    }

    /// Git runner for the project folder.
    pub fn git(&self) -> CoreResult<Git> {
        self.project().map(Git::new).ok_or(CoreError::NoProject)
    }

    // ==================== Configuration & Events ====================

    /// Returns the editor configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribes to editor events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EditorEvent> {
        self.event_bus.subscribe()
    }

    fn emit(&self, event: EditorEvent) {
        self.event_bus.emit(event);
    }
}
