//! Source text and line/column translation.
//!
//! The engine only ever sees a [`Source`]: it never reads files. Offsets are
//! UTF-8 byte offsets into the text.

use crate::text::TextSize;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Line and column position in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct LineCol {
    /// Zero-based line number
    pub line: u32,
    /// Zero-based column number (in UTF-8 bytes)
    pub column: u32,
}

impl LineCol {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Displays one-based `line:column`.
impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Line start table for O(log n) offset to line/column conversion
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of line starts (including the start of the first line at 0)
    line_starts: Vec<TextSize>,
    text_len: TextSize,
}

impl LineIndex {
    /// Scan `text` once, recording every `\n`, `\r\n` and lone `\r` line break.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::zero()];

        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line_starts.push(TextSize::of(i + 1));
                    i += 1;
                }
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                    line_starts.push(TextSize::of(i + 2));
                    i += 2;
                }
                b'\r' => {
                    line_starts.push(TextSize::of(i + 1));
                    i += 1;
                }
                _ => i += 1,
            }
        }

        Self {
            line_starts,
            text_len: TextSize::of(text.len()),
        }
    }

    /// Convert a byte offset to a line/column position.
    ///
    /// Offsets past the end of the text are clamped to the end.
    #[must_use]
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let offset = offset.min(self.text_len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        LineCol {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: offset.into().saturating_sub(line_start.into()),
        }
    }

    #[must_use]
    pub fn line_count(&self) -> u32 {
        u32::try_from(self.line_starts.len()).unwrap_or(u32::MAX)
    }

    /// Byte offset of the start of `line`, `None` when out of bounds.
    #[must_use]
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        self.line_starts.get(line as usize).copied()
    }
}

/// Input text handed to the parser.
///
/// Cheap to clone; the text is shared.
#[derive(Debug, Clone)]
pub struct Source {
    text: Arc<str>,
    index: LineIndex,
}

impl Source {
    #[must_use]
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let index = LineIndex::new(&text);
        Self { text, index }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Line and column of a byte offset.
    #[must_use]
    pub fn position(&self, offset: usize) -> LineCol {
        self.index.line_col(TextSize::of(offset))
    }

    /// Text of the line containing `offset`, without its line break.
    #[must_use]
    pub fn line_text(&self, offset: usize) -> &str {
        let pos = self.position(offset);
        let start = self
            .index
            .line_start(pos.line)
            .map_or(0, usize::from);
        let end = self
            .index
            .line_start(pos.line + 1)
            .map_or(self.text.len(), usize::from);
        self.text
            .get(start..end)
            .unwrap_or_default()
            .trim_end_matches(['\n', '\r'])
    }

    #[must_use]
    pub const fn line_index(&self) -> &LineIndex {
        &self.index
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&Source> for Source {
    fn from(source: &Source) -> Self {
        source.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_unix_line_endings() {
        let index = LineIndex::new("line 1\nline 2\nline 3");

        assert_eq!(index.line_col(TextSize::from(0)), LineCol::new(0, 0));
        assert_eq!(index.line_col(TextSize::from(6)), LineCol::new(0, 6));
        assert_eq!(index.line_col(TextSize::from(7)), LineCol::new(1, 0));
        assert_eq!(index.line_col(TextSize::from(14)), LineCol::new(2, 0));
    }

    #[test]
    fn test_line_col_windows_and_mac_line_endings() {
        let index = LineIndex::new("a\r\nb\rc");

        assert_eq!(index.line_col(TextSize::from(3)), LineCol::new(1, 0));
        assert_eq!(index.line_col(TextSize::from(5)), LineCol::new(2, 0));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_line_col_clamps_past_end() {
        let index = LineIndex::new("abc");
        assert_eq!(index.line_col(TextSize::from(99)), LineCol::new(0, 3));
    }

    #[test]
    fn test_source_position_and_line_text() {
        let source = Source::new("first\nsecond line\nthird");

        assert_eq!(source.position(8), LineCol::new(1, 2));
        assert_eq!(source.line_text(8), "second line");
        assert_eq!(source.line_text(0), "first");
        assert_eq!(source.line_text(source.len()), "third");
        assert_eq!(source.len(), 23);
    }

    #[test]
    fn test_line_col_display_is_one_based() {
        assert_eq!(LineCol::new(0, 4).to_string(), "1:5");
    }
}
