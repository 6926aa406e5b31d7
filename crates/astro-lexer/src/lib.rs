//! Astro Lexer
//!
//! Tokenizes `.astro` component source into a flat stream of structural
//! tokens: the `---` frontmatter block, tags and attributes, text, comments,
//! `{expression}` boundaries, raw-text element bodies and fenced code blocks.
//!
//! Tokens borrow their text from the source, so scanning never copies
//! markup.
//!
//! # Example
//!
//! ```
//! use astro_lexer::{Scanner, TokenKind};
//!
//! let tokens = Scanner::tokenize("").unwrap();
//! assert_eq!(tokens.len(), 1); // Just EOF
//! assert_eq!(tokens[0].kind, TokenKind::Eof);
//! ```

pub mod frame;
pub mod scanner;
pub mod token;

pub use frame::{code_frame, LineIndex, Position};
pub use scanner::Scanner;
pub use token::{is_raw_text_element, is_void_element, Span, Token, TokenKind};

/// A fatal error raised while scanning or parsing a template.
///
/// Carries a stable machine-readable `code`, a human message, the start and
/// end positions of the offending source range and a rendered code frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[error("{message} ({code}) at line {}, column {}", start.line, start.column)]
pub struct CompileError {
    pub code: &'static str,
    pub message: String,
    pub start: Position,
    pub end: Position,
    pub frame: String,
}

impl CompileError {
    /// Build an error for the byte range `start..end` of `source`.
    pub fn new(
        code: &'static str,
        message: impl Into<String>,
        source: &str,
        start: usize,
        end: usize,
    ) -> Self {
        let index = LineIndex::new(source);
        let start = index.position(start);
        let end = index.position(end.max(start.offset));
        Self {
            code,
            message: message.into(),
            frame: code_frame(source, &index, start),
            start,
            end,
        }
    }
}
