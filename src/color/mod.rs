//! Inline color markup - `~XX` tokens expanded to terminal escape sequences
//!
//! A token is a `~` followed by a two-character code from the [`ColorTable`].
//! `^~` escapes a tilde so the following characters are never looked up.
//! Entry 0 of the table is the reset sequence appended to every rendered line.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Character that introduces a color token
pub const TOKEN_MARK: u8 = b'~';

/// Character that escapes a following [`TOKEN_MARK`]
pub const ESCAPE_MARK: u8 = b'^';

/// Width of a color code, not counting the mark
pub const CODE_LEN: usize = 2;

/// One entry of the color table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCode {
    /// Two-character code following the `~`
    #[serde(rename = "textCode")]
    pub text_code: String,

    /// Raw bytes written in place of the token
    #[serde(rename = "escapeCode")]
    pub escape_code: String,
}

impl ColorCode {
    pub fn new(text_code: impl Into<String>, escape_code: impl Into<String>) -> Self {
        Self {
            text_code: text_code.into(),
            escape_code: escape_code.into(),
        }
    }
}

/// Ordered, read-only table of color codes
#[derive(Debug, Clone)]
pub struct ColorTable {
    codes: Vec<ColorCode>,
}

impl ColorTable {
    /// Build a table from its entries. The first entry is the reset sequence.
    pub fn from_codes(codes: Vec<ColorCode>) -> Result<Self> {
        if codes.is_empty() {
            bail!("color table needs at least the reset entry");
        }
        for code in &codes {
            if code.text_code.len() != CODE_LEN || !code.text_code.is_ascii() {
                bail!(
                    "color code '{}' must be {} ASCII characters",
                    code.text_code,
                    CODE_LEN
                );
            }
        }
        for (i, code) in codes.iter().enumerate() {
            if codes[..i].iter().any(|c| c.text_code == code.text_code) {
                bail!("duplicate color code '{}'", code.text_code);
            }
        }
        Ok(Self { codes })
    }

    /// Load a table from a JSON array of `{textCode, escapeCode}` objects
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading color codes from {}", path.display()))?;
        let codes: Vec<ColorCode> = serde_json::from_str(&content)
            .with_context(|| format!("parsing color codes in {}", path.display()))?;
        Self::from_codes(codes)
    }

    pub fn codes(&self) -> &[ColorCode] {
        &self.codes
    }

    /// Escape sequence appended to every rendered string
    pub fn reset(&self) -> &str {
        &self.codes[0].escape_code
    }

    /// Expand every recognised token and append the reset sequence
    pub fn render(&self, raw: &str) -> String {
        let mut out = self.scan(raw, |out, code| out.push_str(&code.escape_code));
        out.push_str(self.reset());
        out
    }

    /// Remove every recognised token, leaving the plain text
    pub fn strip(&self, raw: &str) -> String {
        self.scan(raw, |_, _| {})
    }

    /// Number of bytes taken up by recognised tokens in `raw`.
    ///
    /// Templates add this to a field width so markup does not eat into the
    /// visible padding of fixed-width columns.
    pub fn count_markup_bytes(&self, raw: &str) -> usize {
        let mut count = 0;
        self.scan(raw, |_, code| count += 1 + code.text_code.len());
        count
    }

    fn lookup(&self, bytes: &[u8], at: usize) -> Option<&ColorCode> {
        let token = bytes.get(at + 1..at + 1 + CODE_LEN)?;
        self.codes.iter().find(|c| c.text_code.as_bytes() == token)
    }

    /// Walk `raw`, copying literal text and handing each token to `on_code`.
    ///
    /// Only ASCII bytes are ever skipped over, so every slice boundary is a
    /// char boundary.
    fn scan(&self, raw: &str, mut on_code: impl FnMut(&mut String, &ColorCode)) -> String {
        let bytes = raw.as_bytes();
        let mut out = String::with_capacity(raw.len());
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                ESCAPE_MARK if bytes.get(i + 1) == Some(&TOKEN_MARK) => i += 2,
                TOKEN_MARK => match self.lookup(bytes, i) {
                    Some(code) => {
                        out.push_str(&raw[literal_start..i]);
                        on_code(&mut out, code);
                        i += 1 + CODE_LEN;
                        literal_start = i;
                    }
                    None => i += 1,
                },
                _ => i += 1,
            }
        }

        out.push_str(&raw[literal_start..]);
        out
    }
}

impl Default for ColorTable {
    /// The classic talker palette: attributes, then foreground, then background
    fn default() -> Self {
        let codes = [
            ("RS", "\x1b[0m"),
            ("OL", "\x1b[1m"),
            ("UL", "\x1b[4m"),
            ("LI", "\x1b[5m"),
            ("RV", "\x1b[7m"),
            ("FK", "\x1b[30m"),
            ("FR", "\x1b[31m"),
            ("FG", "\x1b[32m"),
            ("FY", "\x1b[33m"),
            ("FB", "\x1b[34m"),
            ("FM", "\x1b[35m"),
            ("FT", "\x1b[36m"),
            ("FW", "\x1b[37m"),
            ("BK", "\x1b[40m"),
            ("BR", "\x1b[41m"),
            ("BG", "\x1b[42m"),
            ("BY", "\x1b[43m"),
            ("BB", "\x1b[44m"),
            ("BM", "\x1b[45m"),
            ("BT", "\x1b[46m"),
            ("BW", "\x1b[47m"),
        ];
        Self {
            codes: codes
                .iter()
                .map(|(text, escape)| ColorCode::new(*text, *escape))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> ColorTable {
        ColorTable::default()
    }

    #[test]
    fn test_every_code_renders_and_strips() {
        let table = table();
        for code in table.codes() {
            let raw = format!("~{}", code.text_code);
            assert_eq!(
                table.render(&raw),
                format!("{}{}", code.escape_code, table.reset())
            );
            assert_eq!(table.strip(&raw), "");
        }
    }

    #[test]
    fn test_render_appends_reset_to_plain_text() {
        let table = table();
        assert_eq!(table.render("hello"), "hello\x1b[0m");
        assert_eq!(table.render(""), "\x1b[0m");
    }

    #[test]
    fn test_render_mixed_text() {
        let table = table();
        assert_eq!(
            table.render("a ~FRred~RS word"),
            "a \x1b[31mred\x1b[0m word\x1b[0m"
        );
    }

    #[test]
    fn test_unknown_token_is_literal() {
        let table = table();
        assert_eq!(table.render("~ZZ"), "~ZZ\x1b[0m");
        assert_eq!(table.strip("~ZZ"), "~ZZ");
    }

    #[test]
    fn test_trailing_tilde_does_not_overrun() {
        let table = table();
        assert_eq!(table.render("abc~"), "abc~\x1b[0m");
        assert_eq!(table.render("abc~F"), "abc~F\x1b[0m");
        assert_eq!(table.strip("~"), "~");
        assert_eq!(table.count_markup_bytes("x~R"), 0);
    }

    #[test]
    fn test_caret_escapes_token() {
        let table = table();
        assert_eq!(table.render("^~RS"), "^~RS\x1b[0m");
        assert_eq!(table.strip("^~OLbob"), "^~OLbob");
        assert_eq!(table.count_markup_bytes("^~OL"), 0);
    }

    #[test]
    fn test_multibyte_text_survives() {
        let table = table();
        assert_eq!(table.strip("~FGcafé ~OL☕"), "café ☕");
    }

    #[test]
    fn test_count_markup_bytes() {
        let table = table();
        assert_eq!(table.count_markup_bytes("plain"), 0);
        assert_eq!(table.count_markup_bytes("~FGbob~RS"), 6);
    }

    #[test]
    fn test_from_codes_rejects_bad_tables() {
        assert!(ColorTable::from_codes(vec![]).is_err());
        assert!(ColorTable::from_codes(vec![ColorCode::new("RST", "\x1b[0m")]).is_err());
        assert!(ColorTable::from_codes(vec![
            ColorCode::new("RS", "\x1b[0m"),
            ColorCode::new("RS", "\x1b[1m"),
        ])
        .is_err());
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colorCodes.json");
        std::fs::write(
            &path,
            r#"[{"textCode":"RS","escapeCode":"<reset>"},{"textCode":"FG","escapeCode":"<green>"}]"#,
        )
        .unwrap();

        let table = ColorTable::load(&path).unwrap();
        assert_eq!(table.render("~FGhi"), "<green>hi<reset>");
    }

    proptest! {
        #[test]
        fn prop_strip_is_identity_without_tilde(s in "[^~]*") {
            prop_assert_eq!(table().strip(&s), s);
        }

        #[test]
        fn prop_render_never_panics(s in ".*") {
            let rendered = table().render(&s);
            prop_assert!(rendered.ends_with("\x1b[0m"));
        }

        #[test]
        fn prop_strip_removes_what_count_measures(s in "(~[A-Z]{2}|[a-z ]){0,20}") {
            let table = table();
            prop_assert_eq!(
                table.strip(&s).len() + table.count_markup_bytes(&s),
                s.len()
            );
        }
    }
}
