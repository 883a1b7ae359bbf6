//! Inline color markup.
//!
//! Styled spans are written as `[color=rrggbb]text[/color]`. Characters the
//! markup renderer would misread are escaped as entities, so the only `[`
//! and `]` left in the output belong to tags.
//!
//! ## Learning: Side Tables Instead of Re-parsing
//!
//! The marked-up string is longer than the text it shows. Rather than
//! re-scanning markup to find where logical character `n` ended up,
//! [`Rendered`] records that offset while it writes.

use crate::lexer::Token;
use crate::style::StyleMap;

const CLOSE_TAG: &str = "[/color]";

/// Entity for a markup-significant character.
fn entity(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '[' => Some("&bl;"),
        ']' => Some("&br;"),
        _ => None,
    }
}

fn push_escaped(out: &mut String, c: char) {
    match entity(c) {
        Some(e) => out.push_str(e),
        None => out.push(c),
    }
}

/// Escapes every markup-significant character in `text`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        push_escaped(&mut out, c);
    }
    out
}

/// Marked-up text plus the position of every logical character in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    markup: String,
    /// Byte offset into `markup` where each logical character starts, with
    /// one trailing entry for the end of the text.
    offsets: Vec<usize>,
}

impl Rendered {
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Number of logical characters rendered.
    pub fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Byte offset in the markup of logical character `caret`.
    /// Positions past the end clamp to the end of the text.
    pub fn markup_offset(&self, caret: usize) -> usize {
        self.offsets[caret.min(self.char_count())]
    }
}

/// Wraps each token in the color tag of its kind.
pub fn render(tokens: &[Token<'_>], styles: &StyleMap) -> Rendered {
    let capacity = tokens.iter().map(|t| t.text.len()).sum::<usize>();
    let mut markup = String::with_capacity(capacity * 2);
    let mut offsets = Vec::with_capacity(capacity + 1);
    let mut end = 0;

    for token in tokens {
        let color = styles.color(token.kind);
        if let Some(color) = color {
            markup.push_str("[color=");
            markup.push_str(&color.to_string());
            markup.push(']');
        }
        for c in token.text.chars() {
            offsets.push(markup.len());
            push_escaped(&mut markup, c);
            end = markup.len();
        }
        if color.is_some() {
            markup.push_str(CLOSE_TAG);
        }
    }
    offsets.push(end);

    Rendered { markup, offsets }
}

/// Recovers the plain text from markup: tags removed, entities decoded.
pub fn plain_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(c) = rest.chars().next() {
        if c == '[' {
            match rest.find(']') {
                Some(close) => rest = &rest[close + 1..],
                None => {
                    out.push_str(rest);
                    break;
                }
            }
            continue;
        }

        if c == '&' {
            let decoded = ['&', '<', '>', '[', ']']
                .into_iter()
                .find_map(|ch| entity(ch).filter(|e| rest.starts_with(*e)).map(|e| (ch, e.len())));
            if let Some((ch, len)) = decoded {
                out.push(ch);
                rest = &rest[len..];
                continue;
            }
        }

        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}
