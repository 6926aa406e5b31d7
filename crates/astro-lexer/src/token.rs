/// A region of source text with the line and column of its first byte.
///
/// `start` and `end` are byte offsets; `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// Token classification for Astro template source.
///
/// The payload of every token lives in [`Token::raw`], a slice of the
/// source, so kinds carry no data of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TokenKind {
    /// `---` fenced block at offset 0. `raw` is the code between the fences.
    Frontmatter,
    /// `<!doctype ...>`. `raw` is the doctype value.
    Doctype,

    // Tags
    /// `<name`. `raw` is the tag name.
    TagOpen,
    /// `>` finishing an open tag.
    TagEnd,
    /// `/>` finishing an open tag.
    TagSelfClose,
    /// `</name>`. `raw` is the tag name.
    TagClose,
    AttrName,
    /// Attribute value including its delimiters (`"a"`, `'a'`, `` `a` ``,
    /// `{a}`) or a bare unquoted value.
    AttrValue,

    // Content
    Text,
    /// `<!-- ... -->`. `raw` is the comment body.
    Comment,
    ExprStart,
    ExprEnd,
    /// Opening fence line. `raw` is the fence run plus its metadata line.
    CodeFenceStart,
    /// Closing fence run.
    CodeFenceEnd,

    Eof,
}

/// A token produced by the Astro scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub span: Span,
    pub raw: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, span: Span, raw: &'a str) -> Self {
        Self { kind, span, raw }
    }
}

/// HTML void elements (no children, no closing tag).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is never tokenized as markup.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "xmp"];

/// Check if a tag name is an HTML void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

/// Check if a tag name opens a raw-text region.
pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}
