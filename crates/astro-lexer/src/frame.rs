//! Source positions and code frames for diagnostics.

use std::fmt::Write as _;

/// Lines of context printed above and below the error line.
const FRAME_CONTEXT: usize = 2;

/// A resolved source location. `line` and `column` are 1-based, `column`
/// counts characters rather than bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Maps byte offsets to line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Resolve a byte offset. Offsets past the end clamp to the end.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line = self.line_starts.partition_point(|&s| s <= offset);
        let line_start = self.line_starts[line - 1];
        let column = match self.source.get(line_start..offset) {
            Some(prefix) => prefix.chars().count() + 1,
            None => offset - line_start + 1,
        };
        Position {
            line,
            column,
            offset,
        }
    }

    /// Text of a 1-based line without its terminator.
    pub fn line_text(&self, line: usize) -> &'a str {
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .map_or(self.source.len(), |next| next - 1);
        self.source[start..end].trim_end_matches('\r')
    }
}

/// Render a code frame pointing at `at`:
///
/// ```text
///   1 | <div>
/// > 2 |   <span></div>
///     |         ^
///   3 | </div>
/// ```
pub fn code_frame(source: &str, index: &LineIndex<'_>, at: Position) -> String {
    if source.is_empty() {
        return String::new();
    }
    let first = at.line.saturating_sub(FRAME_CONTEXT).max(1);
    let last = (at.line + FRAME_CONTEXT).min(index.line_count());
    let gutter = last.to_string().len();

    let mut frame = String::new();
    for line in first..=last {
        let marker = if line == at.line { '>' } else { ' ' };
        let text = index.line_text(line);
        let _ = writeln!(frame, "{marker} {line:>gutter$} | {text}");
        if line == at.line {
            let pad = " ".repeat(at.column.saturating_sub(1));
            let _ = writeln!(frame, "  {:>gutter$} | {pad}^", "");
        }
    }
    frame.truncate(frame.trim_end().len());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_position_first_line() {
        let index = LineIndex::new("<div>");
        let pos = index.position(1);
        assert_eq!((pos.line, pos.column, pos.offset), (1, 2, 1));
    }

    #[test]
    fn test_position_after_newlines() {
        let index = LineIndex::new("a\nbc\nd");
        assert_eq!(index.position(3).line, 2);
        assert_eq!(index.position(3).column, 2);
        assert_eq!(index.position(5).line, 3);
        assert_eq!(index.position(5).column, 1);
    }

    #[test]
    fn test_position_counts_chars_not_bytes() {
        let index = LineIndex::new("héllo");
        // 'é' is two bytes
        assert_eq!(index.position(3).column, 3);
    }

    #[test]
    fn test_position_clamps_past_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.position(99).offset, 2);
    }

    #[test]
    fn test_code_frame() {
        let source = "<div>\n  <span></div>\n</div>";
        let index = LineIndex::new(source);
        let frame = code_frame(source, &index, index.position(14));
        assert_eq!(
            frame,
            "  1 | <div>\n> 2 |   <span></div>\n    |         ^\n  3 | </div>"
        );
    }
}
