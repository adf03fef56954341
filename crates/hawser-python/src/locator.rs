//! Raw-text offset classification: words, primaries, syntactic role.
//!
//! The locator works on source text without a full tokenizer, so it keeps
//! working on files mid-edit. For an offset it finds the enclosing word
//! (identifier characters and underscore), the enclosing *primary* (the
//! dotted chain optionally preceded by balanced parenthesised
//! subexpressions and string literals), and classifies the offset's
//! syntactic role: assignment target, from-import module, imported name,
//! def/class header name, call position.
//!
//! Primary extraction skips strings delimited by one or three quote
//! characters and honors trailing-backslash line continuation. Malformed
//! input degrades to the last valid subrange instead of failing.

use hawser_ast::nodes::Span;

/// Offset classifier over one file's text.
#[derive(Debug)]
pub struct WordLocator<'a> {
    source: &'a str,
    bytes: &'a [u8],
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

impl<'a> WordLocator<'a> {
    pub fn new(source: &'a str) -> Self {
        WordLocator {
            source,
            bytes: source.as_bytes(),
        }
    }

    /// True when `offset` is inside the buffer and on a word character.
    pub fn is_on_word(&self, offset: usize) -> bool {
        offset < self.bytes.len() && is_word_byte(self.bytes[offset])
    }

    // ------------------------------------------------------------------
    // Words
    // ------------------------------------------------------------------

    fn word_start(&self, offset: usize) -> usize {
        let mut current = offset;
        while current > 0 && is_word_byte(self.bytes[current - 1]) {
            current -= 1;
        }
        current
    }

    fn word_end(&self, offset: usize) -> usize {
        let mut current = offset;
        while current < self.bytes.len() && is_word_byte(self.bytes[current]) {
            current += 1;
        }
        current
    }

    /// The word containing `offset`, or `None` when the offset is not on
    /// a word character.
    pub fn word_at(&self, offset: usize) -> Option<(&'a str, Span)> {
        if !self.is_on_word(offset) {
            return None;
        }
        let span = Span::new(self.word_start(offset), self.word_end(offset));
        Some((&self.source[span.start..span.end], span))
    }

    /// The word immediately before `offset` (skipping nothing).
    pub fn word_before(&self, offset: usize) -> &'a str {
        let offset = offset.min(self.bytes.len());
        if offset == 0 {
            return "";
        }
        let start = self.word_start(offset - 1);
        &self.source[start..offset]
    }

    // ------------------------------------------------------------------
    // Backward scanning helpers
    // ------------------------------------------------------------------

    /// The last non-space byte at or before `offset`, treating a newline
    /// preceded by a backslash as joined continuation. Returns -1 when
    /// only whitespace precedes, so backward scans cannot wedge at the
    /// buffer start.
    fn last_non_space(&self, offset: isize) -> isize {
        let mut current = offset;
        while current >= 0 && matches!(self.bytes[current as usize], b' ' | b'\t' | b'\n') {
            while current >= 0 && matches!(self.bytes[current as usize], b' ' | b'\t') {
                current -= 1;
            }
            if current >= 0 && self.bytes[current as usize] == b'\n' {
                current -= 1;
                if current >= 0 && self.bytes[current as usize] == b'\\' {
                    current -= 1;
                }
            }
        }
        current
    }

    /// Start of the string literal whose closing quote is at `offset`.
    /// A string whose opener cannot be found degrades to the quote itself.
    fn string_start(&self, offset: usize) -> usize {
        let quote = self.bytes[offset];
        let mut current = offset;
        while current > 0 {
            current -= 1;
            if self.bytes[current] == quote {
                return current;
            }
        }
        offset
    }

    /// Start of the bracketed group whose closer is at `offset`.
    fn parens_start(&self, offset: usize) -> usize {
        let mut current = self.last_non_space(offset as isize - 1);
        while current >= 0 && !matches!(self.bytes[current as usize], b'[' | b'(' | b'{') {
            if !matches!(self.bytes[current as usize], b':' | b',') {
                current = self.primary_start_from(current as usize) as isize;
            }
            current = self.last_non_space(current - 1);
        }
        current.max(0) as usize
    }

    fn atom_start(&self, offset: usize) -> usize {
        let mut offset = offset;
        if matches!(self.bytes[offset], b'\n' | b'\t' | b' ') {
            offset = self.last_non_space(offset as isize).max(0) as usize;
        }
        match self.bytes[offset] {
            b'\'' | b'"' => self.string_start(offset),
            b')' | b']' | b'}' => self.parens_start(offset),
            b if is_word_byte(b) => self.word_start(offset),
            _ => offset,
        }
    }

    /// Start of a primary segment that does not cross a dot.
    fn primary_without_dot_start(&self, offset: usize) -> usize {
        let mut last_parens = offset;
        let mut current = self.last_non_space(offset as isize);
        while current > 0 && matches!(self.bytes[current as usize], b')' | b']' | b'}') {
            last_parens = self.parens_start(current as usize);
            current = self.last_non_space(last_parens as isize - 1);
        }
        if current > 0 && matches!(self.bytes[current as usize], b'\'' | b'"') {
            return self.string_start(current as usize);
        }
        if current >= 0 && is_word_byte(self.bytes[current as usize]) {
            return self.word_start(current as usize);
        }
        last_parens
    }

    /// Start of the dotted primary chain ending at `offset`.
    fn primary_start_from(&self, offset: usize) -> usize {
        let mut current = if self.bytes[offset] == b'.' {
            offset + 1
        } else {
            self.primary_without_dot_start(offset)
        };
        loop {
            if current == 0 {
                break;
            }
            let before = self.last_non_space(current as isize - 1);
            if before < 0 || self.bytes[before as usize] != b'.' {
                break;
            }
            if before == 0 {
                break;
            }
            let next = self.primary_without_dot_start((before - 1) as usize);
            let first = self.bytes[next];
            if !is_word_byte(first) && !matches!(first, b'\'' | b'"' | b'(' | b'[' | b'{') {
                break;
            }
            current = next;
        }
        current
    }

    /// The primary expression whose final word contains `offset`.
    pub fn primary_at(&self, offset: usize) -> Option<(String, Span)> {
        if !self.is_on_word(offset) {
            return None;
        }
        let start = self.primary_start_from(offset);
        let end = self.word_end(offset);
        let text = self.source[start..end].trim();
        Some((text.to_string(), Span::new(start, end)))
    }

    // ------------------------------------------------------------------
    // Line helpers
    // ------------------------------------------------------------------

    fn line_start(&self, offset: usize) -> usize {
        let mut current = offset;
        while current > 0 && self.bytes[current - 1] != b'\n' {
            current -= 1;
        }
        current
    }

    fn line_end(&self, offset: usize) -> usize {
        let mut current = offset;
        while current < self.bytes.len() && self.bytes[current] != b'\n' {
            current += 1;
        }
        current
    }

    fn first_non_space_after(&self, offset: usize) -> usize {
        let mut current = offset;
        while current < self.bytes.len() {
            match self.bytes[current] {
                b' ' | b'\t' => current += 1,
                b'\\' if current + 1 < self.bytes.len() && self.bytes[current + 1] == b'\n' => {
                    current += 2;
                }
                _ => break,
            }
        }
        current
    }

    // ------------------------------------------------------------------
    // Classifiers
    // ------------------------------------------------------------------

    /// True when the word at `offset` is the target of a simple
    /// assignment on its line.
    pub fn is_assigned_here(&self, offset: usize) -> bool {
        let Some((word, span)) = self.word_at(offset) else {
            return false;
        };
        if word.contains('.') {
            return false;
        }
        let line_start = self.line_start(span.start);
        if !self.source[line_start..span.start].trim().is_empty() {
            return false;
        }
        let after = self.first_non_space_after(span.end);
        after < self.bytes.len()
            && self.bytes[after] == b'='
            && self.bytes.get(after + 1) != Some(&b'=')
    }

    /// True when the word at `offset` is the identifier in a `def` or
    /// `class` header.
    pub fn is_name_in_def_header(&self, offset: usize) -> bool {
        let Some((_, span)) = self.word_at(offset) else {
            return false;
        };
        let line_start = self.line_start(span.start);
        let prefix = self.source[line_start..span.start].trim();
        prefix == "def" || prefix == "class"
    }

    /// True when the word at `offset` is immediately called.
    pub fn is_function_called_here(&self, offset: usize) -> bool {
        let Some((_, span)) = self.word_at(offset) else {
            return false;
        };
        if self.is_name_in_def_header(offset) {
            return false;
        }
        let next = self.first_non_space_after(span.end);
        next < self.bytes.len() && self.bytes[next] == b'('
    }

    /// True when `offset` is inside the module field of a from-import.
    pub fn is_from_statement_module(&self, offset: usize) -> bool {
        if !self.is_on_word(offset) {
            return false;
        }
        let stmt_start = self.primary_start_from(offset);
        let line_start = self.line_start(stmt_start);
        self.source[line_start..stmt_start].trim() == "from"
    }

    /// True when `offset` is a name being imported in a from-import
    /// (`from M import HERE`).
    pub fn is_name_after_from_import(&self, offset: usize) -> bool {
        if !self.is_on_word(offset) {
            return false;
        }
        let stmt_start = self.primary_start_from(offset);
        let before = self.last_non_space(stmt_start as isize - 1);
        if before <= 0 {
            return false;
        }
        let prev_word_start = self.word_start(before as usize);
        if &self.source[prev_word_start..=(before as usize)] != "import" {
            return false;
        }
        let before_import = self.last_non_space(prev_word_start as isize - 1);
        if before_import <= 0 {
            return false;
        }
        // Skip the module primary preceding `import`.
        let module_start = self.primary_start_from(before_import as usize);
        let line_start = self.line_start(module_start);
        let mut prefix = self.source[line_start..module_start].trim();
        // Relative-import dots belong to the module field.
        prefix = prefix.trim_end_matches('.').trim_end();
        prefix == "from"
    }

    /// True when the offset is inside a comment on its line.
    pub fn is_in_comment(&self, offset: usize) -> bool {
        let line_start = self.line_start(offset.min(self.bytes.len()));
        let mut i = line_start;
        let mut in_string: Option<u8> = None;
        while i < offset && i < self.bytes.len() {
            let b = self.bytes[i];
            match in_string {
                None => {
                    if b == b'#' {
                        return true;
                    }
                    if b == b'\'' || b == b'"' {
                        in_string = Some(b);
                    }
                }
                Some(q) => {
                    if b == b'\\' {
                        i += 2;
                        continue;
                    }
                    if b == q {
                        in_string = None;
                    }
                }
            }
            i += 1;
        }
        false
    }

    /// True when the offset falls inside a one- or three-quote string
    /// literal on its line (cheap check used by the occurrence prescan).
    pub fn is_in_string(&self, offset: usize) -> bool {
        let line_start = self.line_start(offset);
        let mut i = line_start;
        let mut delim: Option<(u8, usize)> = None;
        while i < offset && i < self.bytes.len() {
            let b = self.bytes[i];
            match delim {
                None => {
                    if b == b'#' {
                        return false;
                    }
                    if b == b'\'' || b == b'"' {
                        let len = if self.bytes[i..].starts_with(&[b, b, b]) {
                            3
                        } else {
                            1
                        };
                        delim = Some((b, len));
                        i += len;
                        continue;
                    }
                }
                Some((q, len)) => {
                    if b == b'\\' {
                        i += 2;
                        continue;
                    }
                    if b == q {
                        let closes = len == 1
                            || (self.bytes.get(i + 1) == Some(&q)
                                && self.bytes.get(i + 2) == Some(&q));
                        if closes {
                            i += len;
                            delim = None;
                            continue;
                        }
                    }
                }
            }
            i += 1;
        }
        delim.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn word(source: &str, offset: usize) -> &str {
        WordLocator::new(source).word_at(offset).unwrap().0
    }

    fn primary(source: &str, offset: usize) -> String {
        WordLocator::new(source).primary_at(offset).unwrap().0
    }

    mod words {
        use super::*;

        #[test]
        fn word_at_start_middle_end() {
            let source = "a_var + other";
            assert_eq!(word(source, 0), "a_var");
            assert_eq!(word(source, 2), "a_var");
            assert_eq!(word(source, 4), "a_var");
            assert_eq!(word(source, 8), "other");
        }

        #[test]
        fn offset_on_operator_is_no_word() {
            let locator = WordLocator::new("a + b");
            assert!(locator.word_at(2).is_none());
        }

        #[test]
        fn offset_out_of_range_is_no_word() {
            let locator = WordLocator::new("abc");
            assert!(locator.word_at(10).is_none());
        }

        #[test]
        fn word_before() {
            let locator = WordLocator::new("def func():");
            assert_eq!(locator.word_before(3), "def");
        }
    }

    mod primaries {
        use super::*;

        #[test]
        fn dotted_chain() {
            let source = "x = a.b.c";
            assert_eq!(primary(source, 8), "a.b.c");
            assert_eq!(primary(source, 6), "a.b");
            assert_eq!(primary(source, 4), "a");
        }

        #[test]
        fn chain_through_calls() {
            let source = "r = obj.method(arg).attr";
            assert_eq!(primary(source, 20), "obj.method(arg).attr");
        }

        #[test]
        fn chain_from_string_literal() {
            let source = "s = 'hello'.upper";
            assert_eq!(primary(source, 12), "'hello'.upper");
        }

        #[test]
        fn continuation_backslash_is_joined() {
            let source = "x = a.\\\n    b";
            assert_eq!(primary(source, 12), "a.\\\n    b");
        }

        #[test]
        fn primary_stops_at_operators() {
            let source = "y = c + a.b";
            assert_eq!(primary(source, 10), "a.b");
        }
    }

    mod classifiers {
        use super::*;

        #[test]
        fn assignment_target() {
            let locator = WordLocator::new("a_var = 10");
            assert!(locator.is_assigned_here(0));
            assert!(!locator.is_assigned_here(8));
        }

        #[test]
        fn equality_is_not_assignment() {
            let locator = WordLocator::new("a_var == 10");
            assert!(!locator.is_assigned_here(0));
        }

        #[test]
        fn def_header_name() {
            let source = "def func(arg):";
            let locator = WordLocator::new(source);
            assert!(locator.is_name_in_def_header(4));
            assert!(!locator.is_name_in_def_header(9));
        }

        #[test]
        fn class_header_name() {
            let locator = WordLocator::new("class Widget(Base):");
            assert!(locator.is_name_in_def_header(6));
        }

        #[test]
        fn called_function() {
            let source = "result = compute(1)";
            let locator = WordLocator::new(source);
            assert!(locator.is_function_called_here(9));
            assert!(!locator.is_function_called_here(0));
        }

        #[test]
        fn def_header_is_not_a_call() {
            let locator = WordLocator::new("def compute(x):");
            assert!(!locator.is_function_called_here(4));
        }

        #[test]
        fn from_statement_module() {
            let source = "from pkg.mod import name";
            let locator = WordLocator::new(source);
            assert!(locator.is_from_statement_module(5));
            assert!(locator.is_from_statement_module(9));
            assert!(!locator.is_from_statement_module(20));
        }

        #[test]
        fn name_after_from_import() {
            let source = "from pkg.mod import name";
            let locator = WordLocator::new(source);
            assert!(locator.is_name_after_from_import(20));
            assert!(!locator.is_name_after_from_import(5));
        }

        #[test]
        fn plain_import_is_not_from_import_name() {
            let locator = WordLocator::new("import os");
            assert!(!locator.is_name_after_from_import(7));
        }

        #[test]
        fn in_string_detection() {
            let source = "s = 'a name here'";
            let locator = WordLocator::new(source);
            assert!(locator.is_in_string(7));
            assert!(!locator.is_in_string(0));
        }

        #[test]
        fn comment_hash_inside_string_does_not_end_scan() {
            let source = "s = '# not a comment' + name";
            let locator = WordLocator::new(source);
            assert!(!locator.is_in_string(24));
        }
    }
}
