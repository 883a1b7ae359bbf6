//! Lexical analysis.
//!
//! ## Learning: Trait Objects at the Seam
//!
//! Every language is reached through the [`Lexer`] trait. Callers hold a
//! `Box<dyn Lexer + Send>` and never know whether tree-sitter, a plain-text
//! fallback or a test double produced the spans.

use std::ops::Range;
use std::path::Path;

use tree_sitter::{Language, Node, Parser};

use crate::SyntaxError;

/// Lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Keyword,
    Name,
    /// Name introduced by a `def`.
    Function,
    /// Name introduced by a `class`.
    Class,
    /// Builtin functions, types and pseudo-names such as `self`.
    Builtin,
    String,
    Number,
    Operator,
    Punctuation,
    Comment,
    /// Whitespace and anything uncategorized. Never styled.
    Text,
}

impl TokenKind {
    pub const ALL: [TokenKind; 11] = [
        TokenKind::Keyword,
        TokenKind::Name,
        TokenKind::Function,
        TokenKind::Class,
        TokenKind::Builtin,
        TokenKind::String,
        TokenKind::Number,
        TokenKind::Operator,
        TokenKind::Punctuation,
        TokenKind::Comment,
        TokenKind::Text,
    ];

    /// The broader category this one refines, used as a color fallback.
    pub fn parent(self) -> Option<TokenKind> {
        match self {
            TokenKind::Function | TokenKind::Class | TokenKind::Builtin => Some(TokenKind::Name),
            _ => None,
        }
    }

    /// Returns the theme key for this kind.
    pub fn theme_key(self) -> &'static str {
        match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Name => "name",
            TokenKind::Function => "function",
            TokenKind::Class => "class",
            TokenKind::Builtin => "builtin",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Comment => "comment",
            TokenKind::Text => "text",
        }
    }

    /// Parses a theme key.
    pub fn from_theme_key(key: &str) -> Option<TokenKind> {
        TokenKind::ALL.into_iter().find(|k| k.theme_key() == key)
    }
}

/// A classified byte range of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Kind of syntax element
    pub kind: TokenKind,
}

impl HighlightSpan {
    pub fn new(range: Range<usize>, kind: TokenKind) -> Self {
        Self {
            start: range.start,
            end: range.end,
            kind,
        }
    }
}

/// A (category, literal text) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Produces classified spans for a source text.
///
/// Spans may leave gaps (they become [`TokenKind::Text`]) but must be
/// sorted, non-overlapping and on character boundaries.
pub trait Lexer {
    /// Language name, e.g. `"python"`.
    fn language(&self) -> &str;

    fn spans(&mut self, source: &str) -> Result<Vec<HighlightSpan>, SyntaxError>;
}

/// Runs a lexer and turns its spans into tokens that tile `source` exactly.
pub fn tokenize<'a>(lexer: &mut dyn Lexer, source: &'a str) -> Result<Vec<Token<'a>>, SyntaxError> {
    let spans = lexer.spans(source)?;
    let mut tokens = Vec::with_capacity(spans.len() * 2 + 1);
    let mut pos = 0;

    for span in spans {
        if span.start < pos || span.end < span.start || span.end > source.len() {
            return Err(SyntaxError::Format(format!(
                "span {}..{} does not follow offset {} in a {} byte source",
                span.start,
                span.end,
                pos,
                source.len()
            )));
        }
        if !source.is_char_boundary(span.start) || !source.is_char_boundary(span.end) {
            return Err(SyntaxError::Format(format!(
                "span {}..{} splits a character",
                span.start, span.end
            )));
        }
        if span.start > pos {
            tokens.push(Token {
                kind: TokenKind::Text,
                text: &source[pos..span.start],
            });
        }
        if span.end > span.start {
            tokens.push(Token {
                kind: span.kind,
                text: &source[span.start..span.end],
            });
        }
        pos = span.end;
    }

    if pos < source.len() {
        tokens.push(Token {
            kind: TokenKind::Text,
            text: &source[pos..],
        });
    }

    Ok(tokens)
}

/// Python lexer backed by the tree-sitter Python grammar.
pub struct PythonLexer {
    parser: Parser,
}

impl PythonLexer {
    pub fn new() -> Result<Self, SyntaxError> {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| SyntaxError::Parse(e.to_string()))?;
        Ok(Self { parser })
    }
}

impl Lexer for PythonLexer {
    fn language(&self) -> &str {
        "python"
    }

    fn spans(&mut self, source: &str) -> Result<Vec<HighlightSpan>, SyntaxError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| SyntaxError::Tokenize("parser produced no tree".to_string()))?;

        let mut spans = Vec::new();
        let mut cursor = tree.walk();

        // Iterative pre-order walk; deeply nested code must not blow the stack.
        'walk: loop {
            let node = cursor.node();
            let atomic = matches!(node.kind(), "string" | "comment");

            if atomic || node.child_count() == 0 {
                if node.end_byte() > node.start_byte() {
                    if let Some(kind) = classify(node, source) {
                        spans.push(HighlightSpan::new(node.start_byte()..node.end_byte(), kind));
                    }
                }
            } else if cursor.goto_first_child() {
                continue;
            }

            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

/// Lexer for languages without a grammar: everything is unstyled text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainLexer;

impl Lexer for PlainLexer {
    fn language(&self) -> &str {
        "text"
    }

    fn spans(&mut self, _source: &str) -> Result<Vec<HighlightSpan>, SyntaxError> {
        Ok(Vec::new())
    }
}

const PUNCTUATION: &[&str] = &["(", ")", "[", "]", "{", "}", ",", ":", ";"];

const PYTHON_BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "bytearray", "bytes", "callable", "chr", "classmethod",
    "cls", "complex", "dict", "dir", "divmod", "enumerate", "eval", "exec", "filter",
    "float", "format", "frozenset", "getattr", "globals", "hasattr", "hash", "help",
    "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "locals", "map", "max", "min", "next", "object", "oct", "open", "ord", "pow",
    "print", "property", "range", "repr", "reversed", "round", "self", "set",
    "setattr", "slice", "sorted", "staticmethod", "str", "sum", "super", "tuple",
    "type", "vars", "zip",
];

/// Maps a tree-sitter node to a token kind. `None` leaves the node unstyled.
///
/// Soft keywords (`match`, `case`, `type`) are anonymous leaves only where
/// the grammar reads them as keywords; used as names they arrive as
/// `identifier` nodes and are styled as names.
fn classify(node: Node, source: &str) -> Option<TokenKind> {
    let kind = node.kind();

    if !node.is_named() {
        if kind.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
            // The `_` wildcard pattern is a name, not a keyword.
            if kind.chars().all(|c| c == '_') {
                return Some(TokenKind::Name);
            }
            return Some(TokenKind::Keyword);
        }
        if PUNCTUATION.contains(&kind) {
            return Some(TokenKind::Punctuation);
        }
        return Some(TokenKind::Operator);
    }

    match kind {
        "comment" => Some(TokenKind::Comment),
        "string" => Some(TokenKind::String),
        "integer" | "float" => Some(TokenKind::Number),
        "true" | "false" | "none" => Some(TokenKind::Keyword),
        "ellipsis" => Some(TokenKind::Punctuation),
        "identifier" => Some(identifier_kind(node, source)),
        _ => None,
    }
}

fn identifier_kind(node: Node, source: &str) -> TokenKind {
    if let Some(parent) = node.parent() {
        let defines = parent.child_by_field_name("name") == Some(node);
        match parent.kind() {
            "function_definition" if defines => return TokenKind::Function,
            "class_definition" if defines => return TokenKind::Class,
            _ => {}
        }
    }

    let text = &source[node.start_byte()..node.end_byte()];
    if PYTHON_BUILTINS.contains(&text) {
        TokenKind::Builtin
    } else {
        TokenKind::Name
    }
}

/// Creates a lexer for a language name.
pub fn lexer_for(language: &str) -> Result<Box<dyn Lexer + Send>, SyntaxError> {
    match language {
        "python" | "py" => Ok(Box::new(PythonLexer::new()?)),
        "text" | "plain" => Ok(Box::new(PlainLexer)),
        _ => Err(SyntaxError::UnknownLanguage(language.to_string())),
    }
}

/// Detects the language of a file from its extension.
pub fn detect_language(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("py" | "pyw" | "pyi") => "python",
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_tokens(source: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = PythonLexer::new().unwrap();
        tokenize(&mut lexer, source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    fn kind_of(tokens: &[(TokenKind, String)], text: &str) -> TokenKind {
        tokens
            .iter()
            .find(|(_, t)| t == text)
            .map(|(k, _)| *k)
            .unwrap_or_else(|| panic!("no token {text:?} in {tokens:?}"))
    }

    #[test]
    fn test_python_categories() {
        let tokens = python_tokens("def f(x):\n    return x + 1  # done\n");

        assert_eq!(kind_of(&tokens, "def"), TokenKind::Keyword);
        assert_eq!(kind_of(&tokens, "f"), TokenKind::Function);
        assert_eq!(kind_of(&tokens, "("), TokenKind::Punctuation);
        assert_eq!(kind_of(&tokens, "return"), TokenKind::Keyword);
        assert_eq!(kind_of(&tokens, "+"), TokenKind::Operator);
        assert_eq!(kind_of(&tokens, "1"), TokenKind::Number);
        assert_eq!(kind_of(&tokens, "# done"), TokenKind::Comment);
    }

    #[test]
    fn test_strings_are_single_tokens() {
        let tokens = python_tokens("s = 'a [b] <c>'\nt = f\"{s}!\"\n");
        assert_eq!(kind_of(&tokens, "'a [b] <c>'"), TokenKind::String);
        assert_eq!(kind_of(&tokens, "f\"{s}!\""), TokenKind::String);
    }

    #[test]
    fn test_names_and_builtins() {
        let tokens = python_tokens("class Foo:\n    pass\nprint(len(Foo), None, value)\n");
        assert_eq!(kind_of(&tokens, "Foo"), TokenKind::Class);
        assert_eq!(kind_of(&tokens, "print"), TokenKind::Builtin);
        assert_eq!(kind_of(&tokens, "len"), TokenKind::Builtin);
        assert_eq!(kind_of(&tokens, "None"), TokenKind::Keyword);
        assert_eq!(kind_of(&tokens, "value"), TokenKind::Name);
    }

    #[test]
    fn test_soft_keywords() {
        let tokens = python_tokens("match cmd:\n    case _:\n        pass\n");
        assert_eq!(kind_of(&tokens, "match"), TokenKind::Keyword);
        assert_eq!(kind_of(&tokens, "case"), TokenKind::Keyword);
        assert_eq!(kind_of(&tokens, "_"), TokenKind::Name);
        assert_eq!(kind_of(&tokens, "cmd"), TokenKind::Name);

        let tokens = python_tokens("match = 1\n");
        assert_eq!(kind_of(&tokens, "match"), TokenKind::Name);
    }

    #[test]
    fn test_tokens_tile_source() {
        let source = "if (a<b) and c>=d:\n\tx = [1, 2.5, 'ü']\n";
        let joined: String = python_tokens(source).into_iter().map(|(_, t)| t).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_broken_code_still_tokenizes() {
        let source = "def (:\n  return ]]";
        let joined: String = python_tokens(source).into_iter().map(|(_, t)| t).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_empty_source() {
        assert!(python_tokens("").is_empty());
    }

    #[test]
    fn test_plain_lexer_single_token() {
        let tokens = tokenize(&mut PlainLexer, "just text").unwrap();
        assert_eq!(
            tokens,
            vec![Token {
                kind: TokenKind::Text,
                text: "just text"
            }]
        );
    }

    struct Overlapping;

    impl Lexer for Overlapping {
        fn language(&self) -> &str {
            "overlapping"
        }

        fn spans(&mut self, _source: &str) -> Result<Vec<HighlightSpan>, SyntaxError> {
            Ok(vec![
                HighlightSpan::new(0..3, TokenKind::Keyword),
                HighlightSpan::new(2..4, TokenKind::Name),
            ])
        }
    }

    #[test]
    fn test_overlapping_spans_rejected() {
        let result = tokenize(&mut Overlapping, "abcdef");
        assert!(matches!(result, Err(SyntaxError::Format(_))));
    }

    #[test]
    fn test_unknown_language() {
        assert!(matches!(
            lexer_for("cobol"),
            Err(SyntaxError::UnknownLanguage(_))
        ));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("main.py"), "python");
        assert_eq!(detect_language("stubs/mod.PYI"), "python");
        assert_eq!(detect_language("README.md"), "text");
        assert_eq!(detect_language("Makefile"), "text");
    }

    #[test]
    fn test_theme_keys_round_trip() {
        for kind in TokenKind::ALL {
            assert_eq!(TokenKind::from_theme_key(kind.theme_key()), Some(kind));
        }
    }
}
