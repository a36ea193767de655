use serde::{Deserialize, Serialize};

/// Byte range into the raw source. Only the lexer works in byte offsets;
/// everything above it reports line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_str<'src>(&self, source: &'src [u8]) -> &'src [u8] {
        &source[self.start..self.end]
    }
}

/// Line/column extent of a token, node or declaration. Lines and columns
/// are 1-based; the end position names the last character, not one past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceSpan {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    fn is_unset(&self) -> bool {
        self.start_line == 0
    }

    /// Smallest span containing both. Unset spans (all zero) are treated
    /// as empty.
    pub fn cover(self, other: SourceSpan) -> SourceSpan {
        if self.is_unset() {
            return other;
        }
        if other.is_unset() {
            return self;
        }
        let start = if (other.start_line, other.start_col) < (self.start_line, self.start_col) {
            (other.start_line, other.start_col)
        } else {
            (self.start_line, self.start_col)
        };
        let end = if (other.end_line, other.end_col) > (self.end_line, self.end_col) {
            (other.end_line, other.end_col)
        } else {
            (self.end_line, self.end_col)
        };
        SourceSpan::new(start.0, start.1, end.0, end.1)
    }
}
