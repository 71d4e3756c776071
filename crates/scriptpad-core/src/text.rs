//! Byte spans and line/column conversion.
//!
//! All offsets inside the workspace are UTF-8 byte offsets into the document
//! text. Line and column values handed to consumers are 0-based, with columns
//! counted in UTF-16 code units so editor adapters can use them directly.

use serde::Serialize;

/// Half-open byte range `[start, end)` into a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start after end");
        Self { start, end }
    }

    pub fn empty(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `offset` lies strictly inside the span.
    pub fn strictly_contains(&self, offset: usize) -> bool {
        self.start < offset && offset < self.end
    }

    pub fn cover(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A 0-based line/column pair (column in UTF-16 code units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LinePosition {
    pub line: u32,
    pub column: u32,
}

impl LinePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A `#line` remapping: physical lines from `from_line` on are renumbered.
///
/// `mapped_line == None` restores physical numbering (`#line default`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRemap {
    pub from_line: u32,
    pub mapped_line: Option<u32>,
}

/// Pre-computed line start byte offsets for O(log n) position lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    remaps: Vec<LineRemap>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            remaps: Vec::new(),
        }
    }

    /// Attaches `#line` remappings, which must be sorted by `from_line`.
    pub fn with_remaps(mut self, remaps: Vec<LineRemap>) -> Self {
        debug_assert!(remaps.windows(2).all(|w| w[0].from_line <= w[1].from_line));
        self.remaps = remaps;
        self
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Physical position of a byte offset.
    ///
    /// Offsets past the end of `content` clamp to the end.
    pub fn position(&self, content: &str, offset: usize) -> LinePosition {
        let offset = offset.min(content.len());
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];

        let column = content
            .get(line_start..offset)
            .map(|prefix| prefix.chars().map(|c| c.len_utf16() as u32).sum())
            .unwrap_or(0);

        LinePosition::new(line as u32, column)
    }

    /// Position of a byte offset after applying `#line` remappings.
    pub fn mapped_position(&self, content: &str, offset: usize) -> LinePosition {
        let physical = self.position(content, offset);
        LinePosition::new(self.map_line(physical.line), physical.column)
    }

    fn map_line(&self, line: u32) -> u32 {
        let idx = self.remaps.partition_point(|r| r.from_line <= line);
        if idx == 0 {
            return line;
        }
        let remap = self.remaps[idx - 1];
        match remap.mapped_line {
            Some(mapped) => mapped.saturating_add(line - remap.from_line),
            None => line,
        }
    }

    /// Byte offset of a physical line/column, `None` when out of range.
    pub fn offset(&self, content: &str, position: LinePosition) -> Option<usize> {
        let line_start = *self.line_starts.get(position.line as usize)?;
        let line_end = self
            .line_starts
            .get(position.line as usize + 1)
            .copied()
            .unwrap_or(content.len());
        let line = content.get(line_start..line_end)?;

        let mut utf16_count = 0u32;
        for (byte_idx, ch) in line.char_indices() {
            if utf16_count >= position.column {
                return Some(line_start + byte_idx);
            }
            utf16_count += ch.len_utf16() as u32;
        }
        if utf16_count == position.column {
            return Some(line_end);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ascii() {
        let content = "let a = 1;\nlet b = 2;\n";
        let index = LineIndex::new(content);
        assert_eq!(index.position(content, 0), LinePosition::new(0, 0));
        assert_eq!(index.position(content, 4), LinePosition::new(0, 4));
        assert_eq!(index.position(content, 11), LinePosition::new(1, 0));
        assert_eq!(index.position(content, 15), LinePosition::new(1, 4));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_position_counts_utf16_units() {
        let content = "let s = \"日本\"; x";
        let index = LineIndex::new(content);
        let x = content.find('x').unwrap();
        // "日" and "本" are one UTF-16 unit each but three bytes each
        assert_eq!(index.position(content, x), LinePosition::new(0, 14));
    }

    #[test]
    fn test_position_clamps_past_end() {
        let content = "ab";
        let index = LineIndex::new(content);
        assert_eq!(index.position(content, 99), LinePosition::new(0, 2));
    }

    #[test]
    fn test_offset_round_trip() {
        let content = "fn f() {\n  😀x\n}";
        let index = LineIndex::new(content);
        let x = content.find('x').unwrap();
        let pos = index.position(content, x);
        assert_eq!(pos, LinePosition::new(1, 4));
        assert_eq!(index.offset(content, pos), Some(x));
    }

    #[test]
    fn test_offset_out_of_range() {
        let content = "abc\ndef";
        let index = LineIndex::new(content);
        assert_eq!(index.offset(content, LinePosition::new(5, 0)), None);
        assert_eq!(index.offset(content, LinePosition::new(0, 10)), None);
        assert_eq!(index.offset(content, LinePosition::new(1, 3)), Some(7));
    }

    #[test]
    fn test_mapped_position_with_remaps() {
        let content = "a\n#line 100\nb\nc\n#line default\nd\n";
        let index = LineIndex::new(content).with_remaps(vec![
            LineRemap {
                from_line: 2,
                mapped_line: Some(99),
            },
            LineRemap {
                from_line: 5,
                mapped_line: None,
            },
        ]);
        let at = |needle: &str| content.find(needle).unwrap();
        assert_eq!(index.mapped_position(content, at("a")).line, 0);
        assert_eq!(index.mapped_position(content, at("b")).line, 99);
        assert_eq!(index.mapped_position(content, at("c")).line, 100);
        assert_eq!(index.mapped_position(content, at("\nd") + 1).line, 5);
    }

    #[test]
    fn test_mapped_line_saturates() {
        let content = "#line\na\nb\nc\n";
        let index = LineIndex::new(content).with_remaps(vec![LineRemap {
            from_line: 1,
            mapped_line: Some(u32::MAX - 1),
        }]);
        let at = |needle: &str| content.find(needle).unwrap();
        assert_eq!(index.mapped_position(content, at("a")).line, u32::MAX - 1);
        assert_eq!(index.mapped_position(content, at("b")).line, u32::MAX);
        assert_eq!(index.mapped_position(content, at("c")).line, u32::MAX);
    }

    #[test]
    fn test_span_helpers() {
        let span = TextSpan::new(3, 7);
        assert_eq!(span.len(), 4);
        assert!(span.strictly_contains(4));
        assert!(!span.strictly_contains(3));
        assert!(!span.strictly_contains(7));
        assert_eq!(span.cover(TextSpan::new(1, 4)), TextSpan::new(1, 7));
        assert!(TextSpan::empty(2).is_empty());
    }
}
