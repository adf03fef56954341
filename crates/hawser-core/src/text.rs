//! Source line indexing and logical-line coalescing.
//!
//! This module provides two views over a text buffer:
//!
//! - [`LineIndex`]: byte offset ↔ 1-indexed line number conversions backed
//!   by a sorted table of line-start offsets (O(log L) lookups).
//! - [`LogicalLines`]: coalesces physical lines joined by backslash
//!   continuation or an unbalanced bracket into a single logical range.
//!
//! ## Coordinate Conventions
//!
//! - Lines are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Offsets beyond the buffer are clamped to the end (defensive clamping)

// ============================================================================
// Line Index
// ============================================================================

/// Byte-offset ↔ line-number table over a text buffer.
///
/// Construction walks the buffer once collecting line starts; lookups
/// binary-search the table. A trailing sentinel entry (one past the end)
/// keeps `line_end` uniform for the last line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    source_len: usize,
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build the index for `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        line_starts.push(source.len() + 1);
        LineIndex {
            source_len: source.len(),
            line_starts,
        }
    }

    /// Number of lines in the buffer.
    ///
    /// An empty buffer has one (empty) line; a buffer ending in a newline
    /// has one line per newline plus the trailing empty line, matching the
    /// convention that every offset in `[0, len]` belongs to some line.
    pub fn len(&self) -> u32 {
        (self.line_starts.len() - 1) as u32
    }

    /// True if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.source_len == 0
    }

    /// Byte offset of the start of the 1-indexed line `lineno`.
    ///
    /// `lineno` is clamped to `[1, len]`.
    pub fn line_start(&self, lineno: u32) -> usize {
        let lineno = self.clamp_lineno(lineno);
        self.line_starts[(lineno - 1) as usize]
    }

    /// Byte offset of the end of line `lineno`, excluding its newline.
    pub fn line_end(&self, lineno: u32) -> usize {
        let lineno = self.clamp_lineno(lineno);
        let next_start = self.line_starts[lineno as usize];
        next_start - 1
    }

    /// 1-indexed line number containing the byte `offset`.
    ///
    /// Offsets past the end of the buffer map to the last line.
    pub fn line_number(&self, offset: usize) -> u32 {
        let offset = offset.min(self.source_len);
        // partition_point returns the count of line starts <= offset,
        // which is exactly the 1-indexed line number (the sentinel entry
        // is strictly greater than any clamped offset).
        let n = self.line_starts.partition_point(|&start| start <= offset);
        (n as u32).min(self.len())
    }

    /// The text of line `lineno` within `source`, excluding the newline.
    ///
    /// `source` must be the buffer the index was built from.
    pub fn line<'a>(&self, source: &'a str, lineno: u32) -> &'a str {
        let start = self.line_start(lineno);
        let end = self.line_end(lineno).min(source.len());
        &source[start..end.max(start)]
    }

    fn clamp_lineno(&self, lineno: u32) -> u32 {
        lineno.max(1).min(self.len().max(1))
    }
}

// ============================================================================
// Logical Lines
// ============================================================================

/// State tracked while scanning a physical line for continuation.
///
/// Brackets and backslashes continue a statement onto the next physical
/// line; string delimiters of one or three quote characters suspend bracket
/// counting until the matching closer; `#` terminates scanning for the line
/// unless inside a string.
#[derive(Debug, Default)]
struct ContinuationTracker {
    in_string: String,
    open_brackets: i32,
    explicit_continuation: bool,
}

impl ContinuationTracker {
    fn analyze_line(&mut self, line: &str) {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let ch = bytes[i] as char;
            if ch == '\'' || ch == '"' {
                if self.in_string.is_empty() {
                    if line[i..].starts_with(&ch.to_string().repeat(3)) {
                        self.in_string = ch.to_string().repeat(3);
                        i += 3;
                        continue;
                    }
                    self.in_string = ch.to_string();
                } else if line[i..].starts_with(&self.in_string) && !is_escaped(bytes, i) {
                    let len = self.in_string.len();
                    self.in_string.clear();
                    i += len;
                    continue;
                }
            }
            if self.in_string.is_empty() {
                match ch {
                    '#' => break,
                    '(' | '[' | '{' => self.open_brackets += 1,
                    ')' | ']' | '}' => self.open_brackets -= 1,
                    _ => {}
                }
            }
            i += 1;
        }
        self.explicit_continuation =
            self.in_string.is_empty() && line.trim_end().ends_with('\\');
    }

    fn is_continued(&self) -> bool {
        self.explicit_continuation || self.open_brackets > 0 || !self.in_string.is_empty()
    }
}

/// True when the byte at `i` is preceded by an odd number of backslashes.
fn is_escaped(bytes: &[u8], i: usize) -> bool {
    let mut count = 0;
    let mut j = i;
    while j > 0 && bytes[j - 1] == b'\\' {
        count += 1;
        j -= 1;
    }
    count % 2 == 1
}

/// Logical-line finder over an indexed buffer.
///
/// A logical line is the maximal run of physical lines joined by trailing
/// backslashes or unbalanced brackets. Finding the logical line of a
/// physical line scans forward from an approximated block start, so cost is
/// bounded by the enclosing block rather than the whole file.
#[derive(Debug)]
pub struct LogicalLines<'a> {
    source: &'a str,
    index: &'a LineIndex,
}

/// Keywords that open an indented block; used to bound backward scans.
const BLOCK_START_KEYWORDS: &[&str] = &[
    "def", "class", "if", "else", "elif", "try", "except", "finally", "for", "while", "with",
];

impl<'a> LogicalLines<'a> {
    /// Create a finder over `source` with its prebuilt `index`.
    pub fn new(source: &'a str, index: &'a LineIndex) -> Self {
        LogicalLines { source, index }
    }

    /// The `(first, last)` physical line range of the logical line
    /// containing physical line `lineno`.
    pub fn logical_line(&self, lineno: u32) -> (u32, u32) {
        let lineno = lineno.max(1).min(self.index.len().max(1));
        let scan_from = self.block_start(lineno);
        let mut tracker = ContinuationTracker::default();
        let mut start = scan_from;
        let mut current = scan_from;
        while current <= lineno {
            if !tracker.is_continued() {
                start = current;
            }
            tracker.analyze_line(self.index.line(self.source, current));
            current += 1;
        }
        let mut end = lineno;
        while tracker.is_continued() && end < self.index.len() {
            end += 1;
            tracker.analyze_line(self.index.line(self.source, end));
        }
        (start, end)
    }

    /// Approximate the start of the block containing `lineno` by scanning
    /// backwards for a block-opening keyword at the start of a line.
    fn block_start(&self, lineno: u32) -> u32 {
        for n in (1..=lineno).rev() {
            let line = self.index.line(self.source, n);
            let trimmed = line.trim_start();
            if let Some(word) = trimmed.split(|c: char| !c.is_ascii_alphabetic()).next() {
                if BLOCK_START_KEYWORDS.contains(&word)
                    && trimmed.len() > word.len()
                    && trimmed.as_bytes()[word.len()].is_ascii_whitespace()
                {
                    return n;
                }
            }
        }
        1
    }
}

// ============================================================================
// Tests
// ============================================================================
