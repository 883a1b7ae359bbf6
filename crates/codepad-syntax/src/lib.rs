//! # Codepad Syntax
//!
//! Turns source text into color markup.
//!
//! ```text
//! source ──► Lexer ──► spans ──► tokenize() ──► tokens ──► render() ──► Rendered
//!                                   │                         │
//!                             gaps → Text               StyleMap colors
//! ```
//!
//! ## Learning: Third-party Grammars
//!
//! Python is tokenized with the tree-sitter Python grammar. Tree-sitter is
//! error-tolerant: half-typed code still yields a tree, so a highlighting
//! pass over code that is being edited almost never fails.

pub mod lexer;
pub mod markup;
pub mod style;

pub use lexer::{
    HighlightSpan, Lexer, PlainLexer, PythonLexer, Token, TokenKind, detect_language, lexer_for,
    tokenize,
};
pub use markup::{Rendered, escape, plain_text, render};
pub use style::{Color, StyleMap};

/// Errors that can occur during syntax highlighting.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Unknown token category: {0}")]
    UnknownCategory(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Parser error: {0}")]
    Parse(String),

    #[error("Tokenize error: {0}")]
    Tokenize(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Theme file error: {0}")]
    Theme(#[from] toml::de::Error),
}

/// A lexer paired with the colors it renders in.
pub struct Highlighter {
    lexer: Box<dyn Lexer + Send>,
    styles: StyleMap,
}

impl Highlighter {
    /// Creates a highlighter for a language name.
    pub fn new(language: &str, styles: StyleMap) -> Result<Self, SyntaxError> {
        Ok(Self::with_lexer(lexer_for(language)?, styles))
    }

    /// Creates a highlighter around any lexer.
    pub fn with_lexer(lexer: Box<dyn Lexer + Send>, styles: StyleMap) -> Self {
        Self { lexer, styles }
    }

    /// Tokenizes and renders `source`.
    pub fn highlight(&mut self, source: &str) -> Result<Rendered, SyntaxError> {
        let tokens = tokenize(self.lexer.as_mut(), source)?;
        Ok(render(&tokens, &self.styles))
    }

    pub fn language(&self) -> &str {
        self.lexer.language()
    }

    pub fn styles(&self) -> &StyleMap {
        &self.styles
    }
}

impl std::fmt::Debug for Highlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Highlighter")
            .field("language", &self.lexer.language())
            .field("theme", &self.styles.name())
            .finish()
    }
}
