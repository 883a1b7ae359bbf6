//! Token colors and named themes.
//!
//! A [`StyleMap`] starts from six built-in colors and is layered with a
//! named theme or a TOML theme file. Once built it is never mutated while
//! a document is being highlighted; each highlighter owns its own copy.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::SyntaxError;
use crate::lexer::TokenKind;

/// 24-bit RGB color rendered as `rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `rrggbb` or `rgb`, with or without a leading `#`.
    pub fn from_hex(hex: &str) -> Result<Self, SyntaxError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || SyntaxError::InvalidColor(hex.to_string());

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match digits.len() {
            6 => Ok(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl FromStr for Color {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Built-in colors used when a theme leaves a category out.
mod defaults {
    use super::Color;

    pub const KEYWORD: Color = Color::rgb(0x00, 0x00, 0xff);
    pub const NAME: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const STRING: Color = Color::rgb(0x00, 0x80, 0x00);
    pub const OPERATOR: Color = Color::rgb(0xff, 0x00, 0x00);
    pub const COMMENT: Color = Color::rgb(0x80, 0x80, 0x80);
    pub const NUMBER: Color = Color::rgb(0x00, 0x80, 0x80);
}

/// Token kind to color mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleMap {
    name: String,
    colors: HashMap<TokenKind, Color>,
}

/// On-disk theme format.
///
/// ```toml
/// name = "solarized"
///
/// [colors]
/// keyword = "#859900"
/// string = "2aa198"
/// ```
#[derive(Debug, Deserialize)]
struct ThemeFile {
    name: String,
    #[serde(default)]
    colors: HashMap<String, String>,
}

impl StyleMap {
    /// The six built-in colors and nothing else.
    pub fn builtin() -> Self {
        let colors = HashMap::from([
            (TokenKind::Keyword, defaults::KEYWORD),
            (TokenKind::Name, defaults::NAME),
            (TokenKind::String, defaults::STRING),
            (TokenKind::Operator, defaults::OPERATOR),
            (TokenKind::Comment, defaults::COMMENT),
            (TokenKind::Number, defaults::NUMBER),
        ]);
        Self {
            name: "builtin".to_string(),
            colors,
        }
    }

    /// Built-in defaults layered with a named theme.
    pub fn named(theme: &str) -> Result<Self, SyntaxError> {
        let overrides: &[(TokenKind, Color)] = match theme {
            "builtin" => &[],
            "default" => &[
                (TokenKind::Keyword, Color::rgb(0x00, 0x80, 0x00)),
                (TokenKind::Function, Color::rgb(0x00, 0x00, 0xff)),
                (TokenKind::Class, Color::rgb(0x00, 0x00, 0xff)),
                (TokenKind::Builtin, Color::rgb(0x00, 0x80, 0x00)),
                (TokenKind::String, Color::rgb(0xba, 0x21, 0x21)),
                (TokenKind::Number, Color::rgb(0x66, 0x66, 0x66)),
                (TokenKind::Operator, Color::rgb(0x66, 0x66, 0x66)),
                (TokenKind::Comment, Color::rgb(0x3d, 0x7b, 0x7b)),
            ],
            "monokai" => &[
                (TokenKind::Keyword, Color::rgb(0x66, 0xd9, 0xef)),
                (TokenKind::Name, Color::rgb(0xf8, 0xf8, 0xf2)),
                (TokenKind::Function, Color::rgb(0xa6, 0xe2, 0x2e)),
                (TokenKind::Class, Color::rgb(0xa6, 0xe2, 0x2e)),
                (TokenKind::String, Color::rgb(0xe6, 0xdb, 0x74)),
                (TokenKind::Number, Color::rgb(0xae, 0x81, 0xff)),
                (TokenKind::Operator, Color::rgb(0xf9, 0x26, 0x72)),
                (TokenKind::Punctuation, Color::rgb(0xf8, 0xf8, 0xf2)),
                (TokenKind::Comment, Color::rgb(0x75, 0x71, 0x5e)),
            ],
            _ => return Err(SyntaxError::UnknownTheme(theme.to_string())),
        };

        let mut styles = Self::builtin();
        styles.name = theme.to_string();
        styles.colors.extend(overrides.iter().copied());
        Ok(styles)
    }

    /// Names accepted by [`StyleMap::named`].
    pub fn themes() -> &'static [&'static str] {
        &["builtin", "default", "monokai"]
    }

    /// Loads a TOML theme file layered over the built-in defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SyntaxError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parses a TOML theme layered over the built-in defaults.
    pub fn from_toml(content: &str) -> Result<Self, SyntaxError> {
        let file: ThemeFile = toml::from_str(content)?;

        let mut styles = Self::builtin();
        styles.name = file.name;
        for (key, value) in &file.colors {
            let kind = TokenKind::from_theme_key(key)
                .ok_or_else(|| SyntaxError::UnknownCategory(key.clone()))?;
            styles.colors.insert(kind, value.parse()?);
        }
        Ok(styles)
    }

    /// Overrides a single color.
    pub fn with_color(mut self, kind: TokenKind, color: Color) -> Self {
        self.colors.insert(kind, color);
        self
    }

    /// Theme name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color for a kind, falling back to its parent category.
    /// [`TokenKind::Text`] is never styled.
    pub fn color(&self, kind: TokenKind) -> Option<Color> {
        if kind == TokenKind::Text {
            return None;
        }
        self.colors
            .get(&kind)
            .or_else(|| kind.parent().and_then(|p| self.colors.get(&p)))
            .copied()
    }
}

impl Default for StyleMap {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        assert_eq!(Color::from_hex("#BA2121").unwrap(), Color::rgb(0xba, 0x21, 0x21));
        assert_eq!(Color::from_hex("0000ff").unwrap(), Color::rgb(0, 0, 0xff));
        assert_eq!(Color::from_hex("#fff").unwrap(), Color::rgb(0xff, 0xff, 0xff));
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("zzzzzz").is_err());
        assert!(Color::from_hex("+12345").is_err());
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Color::rgb(0xba, 0x21, 0x21).to_string(), "ba2121");
        assert_eq!(Color::rgb(0, 0x80, 0x80).to_string(), "008080");
    }

    #[test]
    fn test_builtin_defaults() {
        let styles = StyleMap::builtin();
        assert_eq!(styles.color(TokenKind::Keyword).unwrap().to_string(), "0000ff");
        assert_eq!(styles.color(TokenKind::Name).unwrap().to_string(), "000000");
        assert_eq!(styles.color(TokenKind::String).unwrap().to_string(), "008000");
        assert_eq!(styles.color(TokenKind::Operator).unwrap().to_string(), "ff0000");
        assert_eq!(styles.color(TokenKind::Comment).unwrap().to_string(), "808080");
        assert_eq!(styles.color(TokenKind::Number).unwrap().to_string(), "008080");
        assert_eq!(styles.color(TokenKind::Punctuation), None);
        assert_eq!(styles.color(TokenKind::Text), None);
    }

    #[test]
    fn test_refinements_fall_back_to_parent() {
        let styles = StyleMap::builtin();
        assert_eq!(styles.color(TokenKind::Function), styles.color(TokenKind::Name));

        let monokai = StyleMap::named("monokai").unwrap();
        assert_eq!(monokai.color(TokenKind::Function).unwrap().to_string(), "a6e22e");
        assert_eq!(monokai.color(TokenKind::Builtin).unwrap().to_string(), "f8f8f2");
    }

    #[test]
    fn test_named_theme_keeps_unset_defaults() {
        let styles = StyleMap::named("default").unwrap();
        assert_eq!(styles.name(), "default");
        assert_eq!(styles.color(TokenKind::Keyword).unwrap().to_string(), "008000");
        assert_eq!(styles.color(TokenKind::Name).unwrap().to_string(), "000000");
    }

    #[test]
    fn test_unknown_theme() {
        assert!(matches!(
            StyleMap::named("nope"),
            Err(SyntaxError::UnknownTheme(_))
        ));
    }

    #[test]
    fn test_theme_from_toml() {
        let styles = StyleMap::from_toml(
            r##"
name = "solarized"

[colors]
keyword = "#859900"
punctuation = "93a1a1"
"##,
        )
        .unwrap();

        assert_eq!(styles.name(), "solarized");
        assert_eq!(styles.color(TokenKind::Keyword).unwrap().to_string(), "859900");
        assert_eq!(styles.color(TokenKind::Punctuation).unwrap().to_string(), "93a1a1");
        assert_eq!(styles.color(TokenKind::Comment).unwrap().to_string(), "808080");
    }

    #[test]
    fn test_theme_from_toml_rejects_unknown_category() {
        let result = StyleMap::from_toml("name = \"x\"\n[colors]\nsparkle = \"fff\"\n");
        assert!(matches!(result, Err(SyntaxError::UnknownCategory(_))));
    }

    #[test]
    fn test_theme_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("night.toml");
        std::fs::write(&path, "name = \"night\"\n[colors]\nstring = \"#abcdef\"\n").unwrap();

        let styles = StyleMap::load_from(&path).unwrap();
        assert_eq!(styles.name(), "night");
        assert_eq!(styles.color(TokenKind::String).unwrap().to_string(), "abcdef");
    }
}
