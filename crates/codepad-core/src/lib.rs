//! # Codepad Core
//!
//! Editor state around the debounced highlighter.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Editor                           │
//! │  ┌──────────┐  ┌──────────┐  ┌─────────────────────────┐ │
//! │  │  Config  │  │ EventBus │  │  tools (pip/git/python) │ │
//! │  └──────────┘  └──────────┘  └─────────────────────────┘ │
//! │  ┌────────────────────────────────────────────┐          │
//! │  │              DocumentManager (tabs)        │          │
//! │  │  ┌───────────┐ ┌───────────┐               │          │
//! │  │  │ CodeInput │ │ CodeInput │  ...          │          │
//! │  │  └───────────┘ └───────────┘               │          │
//! │  └────────────────────────────────────────────┘          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each [`CodeInput`] owns its text, caret, pending-pass deadline and
//! highlighter. Nothing is shared between documents.

pub mod code_input;
pub mod config;
pub mod document;
pub mod editor;
pub mod event;
pub mod session;
pub mod tools;

pub use code_input::{CodeInput, Display, HighlightSettings, HighlightState};
pub use config::Config;
pub use document::{Document, DocumentId};
pub use editor::Editor;
pub use event::{EditorEvent, EventBus, EventHandler};
pub use session::{DisplaySnapshot, EditInput, HighlightSession};
pub use tools::{Git, Pip, PipAction, ToolError, ToolOutput};

use std::path::PathBuf;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("No active document")]
    NoActiveDocument,

    #[error("Set a project folder first")]
    NoProject,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Not a valid directory: {0}")]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error: {0}")]
    Syntax(#[from] codepad_syntax::SyntaxError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Tool error: {0}")]
    Tool(#[from] tools::ToolError),

    #[error("Highlight session stopped: {0}")]
    Session(String),
}
