use crate::token::{is_raw_text_element, Span, Token, TokenKind};
use crate::CompileError;

/// Nesting state while skipping over embedded JavaScript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsFrame {
    /// Plain code; `depth` counts unclosed `{` opened inside this frame.
    Code { depth: usize },
    /// Inside a template literal.
    Template,
}

/// Position bookkeeping captured at the start of a token.
#[derive(Debug, Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    column: usize,
}

/// Astro template scanner.
///
/// Tokenizes `.astro` source into a stream of tokens in a single forward
/// pass with one byte of lookahead. All delimiters are ASCII, so the scanner
/// walks bytes and only ever slices the source at ASCII boundaries.
///
/// - frontmatter is only recognized at offset 0
/// - raw-text elements are skipped by searching for their literal end tag
/// - `{...}` regions track brace depth plus string, template literal and
///   comment sub-states
/// - code fences are copied verbatim until a matching closing fence
pub struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &'a str) -> Result<Vec<Token<'a>>, CompileError> {
        let mut scanner = Scanner::new(source);
        scanner.scan_tokens()?;
        log::trace!("scanned {} tokens", scanner.tokens.len());
        Ok(scanner.tokens)
    }

    /// Scan all tokens from the source.
    fn scan_tokens(&mut self) -> Result<(), CompileError> {
        self.scan_frontmatter()?;

        while !self.is_at_end() {
            self.scan_content()?;
        }

        let end = self.mark();
        self.push(TokenKind::Eof, end, self.pos, self.pos);
        Ok(())
    }

    /// Scan the next token in content (between tags) context.
    fn scan_content(&mut self) -> Result<(), CompileError> {
        match self.peek() {
            b'<' if self.starts_tag() => self.scan_markup(),
            b'{' => self.scan_expression(),
            _ if self.at_fence_start() => self.scan_code_fence(),
            _ => {
                self.scan_text();
                Ok(())
            }
        }
    }

    // --- Frontmatter ---

    /// Scan a `---` fenced frontmatter block at offset 0.
    fn scan_frontmatter(&mut self) -> Result<(), CompileError> {
        let Some(first_len) = fence_line_len(self.source, 0) else {
            return Ok(());
        };
        let start = self.mark();
        let content_start = first_len;

        let mut line_start = content_start;
        while line_start < self.bytes.len() {
            let line_end = self.source[line_start..]
                .find('\n')
                .map_or(self.bytes.len(), |i| line_start + i);
            if self.source[line_start..line_end].trim_end_matches('\r') == "---" {
                let after = (line_end + 1).min(self.bytes.len());
                self.advance_to(after);
                let token_end = line_end;
                self.tokens.push(Token::new(
                    TokenKind::Frontmatter,
                    Span::new(start.pos, token_end, start.line, start.column),
                    &self.source[content_start..line_start],
                ));
                return Ok(());
            }
            line_start = line_end + 1;
        }

        Err(self.error_at(
            "unterminated-frontmatter",
            "Frontmatter was left open, expected a closing `---` line",
            0,
            3,
        ))
    }

    // --- Markup ---

    /// Whether the `<` at the cursor starts markup rather than literal text.
    fn starts_tag(&self) -> bool {
        let next = self.peek_at(1);
        next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'>')
    }

    /// Scan a comment, doctype, open tag or close tag starting at `<`.
    fn scan_markup(&mut self) -> Result<(), CompileError> {
        if self.matches("<!--") {
            return self.scan_comment();
        }
        if self.peek_at(1) == b'!' {
            return self.scan_doctype();
        }
        if self.peek_at(1) == b'/' {
            return self.scan_close_tag();
        }
        self.scan_open_tag()
    }

    /// Scan `<!-- ... -->`.
    fn scan_comment(&mut self) -> Result<(), CompileError> {
        let start = self.mark();
        self.advance_by(4);
        let body_start = self.pos;
        match self.source[body_start..].find("-->") {
            Some(i) => {
                let body_end = body_start + i;
                self.advance_to(body_end + 3);
                self.push(TokenKind::Comment, start, body_start, body_end);
                Ok(())
            }
            None => Err(self.error_at(
                "unterminated-comment",
                "Comment was left open, expected `-->`",
                start.pos,
                self.bytes.len(),
            )),
        }
    }

    /// Scan `<!doctype value>`.
    fn scan_doctype(&mut self) -> Result<(), CompileError> {
        let start = self.mark();
        let keyword = self.source.get(start.pos + 2..start.pos + 9).unwrap_or("");
        if !keyword.eq_ignore_ascii_case("doctype") {
            return Err(self.error_at(
                "invalid-tag-name",
                "Expected a comment or `<!doctype>`",
                start.pos,
                start.pos + 2,
            ));
        }
        self.advance_by(9);
        let Some(close) = self.source[self.pos..].find('>') else {
            return Err(self.error_at(
                "unterminated-tag",
                "`<!doctype>` was left open, expected `>`",
                start.pos,
                self.bytes.len(),
            ));
        };
        let value_end = self.pos + close;
        let raw = self.source[self.pos..value_end].trim();
        self.advance_to(value_end + 1);
        self.tokens.push(Token::new(
            TokenKind::Doctype,
            Span::new(start.pos, self.pos, start.line, start.column),
            raw,
        ));
        Ok(())
    }

    /// Scan `</name>`.
    fn scan_close_tag(&mut self) -> Result<(), CompileError> {
        let start = self.mark();
        self.advance_by(2);
        let (name_start, name_end) = self.scan_tag_name(start.pos)?;
        self.skip_whitespace();
        if self.is_at_end() {
            return Err(self.unterminated_tag(start.pos, &self.source[name_start..name_end]));
        }
        if self.peek() != b'>' {
            return Err(self.error_at(
                "unterminated-tag",
                format!(
                    "Expected `>` to finish `</{}`",
                    &self.source[name_start..name_end]
                ),
                start.pos,
                self.pos,
            ));
        }
        self.advance();
        self.tokens.push(Token::new(
            TokenKind::TagClose,
            Span::new(start.pos, self.pos, start.line, start.column),
            &self.source[name_start..name_end],
        ));
        Ok(())
    }

    /// Scan `<name attr...>` or `<name attr... />`.
    fn scan_open_tag(&mut self) -> Result<(), CompileError> {
        let start = self.mark();
        self.advance();
        let (name_start, name_end) = self.scan_tag_name(start.pos)?;
        let name = &self.source[name_start..name_end];
        self.tokens.push(Token::new(
            TokenKind::TagOpen,
            Span::new(start.pos, self.pos, start.line, start.column),
            name,
        ));

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                return Err(self.unterminated_tag(start.pos, name));
            }
            match self.peek() {
                b'>' => {
                    let mark = self.mark();
                    self.advance();
                    self.push(TokenKind::TagEnd, mark, mark.pos, self.pos);
                    if is_raw_text_element(name) {
                        self.scan_raw_text(name)?;
                    }
                    return Ok(());
                }
                b'/' if self.peek_at(1) == b'>' => {
                    let mark = self.mark();
                    self.advance_by(2);
                    self.push(TokenKind::TagSelfClose, mark, mark.pos, self.pos);
                    return Ok(());
                }
                b'{' => self.scan_expression()?,
                _ => self.scan_attribute(start.pos, name)?,
            }
        }
    }

    /// Scan a tag name, returning its byte range. An empty name is only
    /// valid for the `<>` / `</>` fragment shorthand.
    fn scan_tag_name(&mut self, tag_start: usize) -> Result<(usize, usize), CompileError> {
        let name_start = self.pos;
        while !self.is_at_end() {
            let b = self.peek();
            if b.is_ascii_whitespace() || matches!(b, b'/' | b'>' | b'{') {
                break;
            }
            self.advance();
        }
        let name = &self.source[name_start..self.pos];
        if !name.is_empty() && !is_valid_tag_name(name) {
            return Err(self.error_at(
                "invalid-tag-name",
                format!("`{name}` is not a valid tag name"),
                tag_start,
                self.pos,
            ));
        }
        Ok((name_start, self.pos))
    }

    /// Scan `name`, `name=value` inside an open tag.
    fn scan_attribute(&mut self, tag_start: usize, tag: &str) -> Result<(), CompileError> {
        let start = self.mark();
        while !self.is_at_end() {
            let b = self.peek();
            if b.is_ascii_whitespace()
                || matches!(b, b'=' | b'>' | b'"' | b'\'' | b'{')
                || (b == b'/' && self.peek_at(1) == b'>')
            {
                break;
            }
            self.advance();
        }
        if self.pos == start.pos {
            return Err(self.error_at(
                "invalid-attribute",
                format!("Unexpected `{}` in <{tag}>", self.peek() as char),
                self.pos,
                self.pos + 1,
            ));
        }
        self.push(TokenKind::AttrName, start, start.pos, self.pos);

        self.skip_whitespace();
        if self.peek() != b'=' {
            return Ok(());
        }
        self.advance();
        self.skip_whitespace();
        if self.is_at_end() {
            return Err(self.unterminated_tag(tag_start, tag));
        }

        let value = self.mark();
        match self.peek() {
            quote @ (b'"' | b'\'') => {
                self.advance();
                match self.source[self.pos..].find(quote as char) {
                    Some(i) => self.advance_to(self.pos + i + 1),
                    None => {
                        return Err(self.error_at(
                            "unterminated-string",
                            "Attribute value was left open, expected a closing quote",
                            value.pos,
                            self.bytes.len(),
                        ))
                    }
                }
            }
            b'`' => {
                self.advance();
                if self.skip_js(vec![JsFrame::Template]).is_err() {
                    return Err(self.error_at(
                        "unterminated-string",
                        "Template literal attribute was left open, expected a closing backtick",
                        value.pos,
                        self.bytes.len(),
                    ));
                }
            }
            b'{' => {
                self.advance();
                if self.skip_js(vec![JsFrame::Code { depth: 0 }]).is_err() {
                    return Err(self.unterminated_expression(value.pos));
                }
            }
            _ => {
                while !self.is_at_end() {
                    let b = self.peek();
                    if b.is_ascii_whitespace()
                        || matches!(b, b'"' | b'\'' | b'=' | b'<' | b'>' | b'`')
                        || (b == b'/' && self.peek_at(1) == b'>')
                    {
                        break;
                    }
                    self.advance();
                }
            }
        }
        self.push(TokenKind::AttrValue, value, value.pos, self.pos);
        Ok(())
    }

    /// Skip the body of a raw-text element up to (not including) its end tag.
    fn scan_raw_text(&mut self, name: &str) -> Result<(), CompileError> {
        let start = self.mark();
        let Some(end) = find_end_tag(self.bytes, self.pos, name) else {
            return Err(self.error_at(
                "unterminated-raw-text",
                format!("<{name}> was left open, expected `</{name}>`"),
                start.pos,
                self.bytes.len(),
            ));
        };
        if end > start.pos {
            self.advance_to(end);
            self.push(TokenKind::Text, start, start.pos, end);
        }
        self.scan_close_tag()
    }

    // --- Expressions ---

    /// Scan `{...}` into `ExprStart`, an optional `Text` holding the code,
    /// and `ExprEnd`.
    fn scan_expression(&mut self) -> Result<(), CompileError> {
        let open = self.mark();
        self.advance();
        self.push(TokenKind::ExprStart, open, open.pos, self.pos);

        let code = self.mark();
        if self.skip_js(vec![JsFrame::Code { depth: 0 }]).is_err() {
            return Err(self.unterminated_expression(open.pos));
        }
        // skip_js leaves the cursor after the closing brace
        let close_pos = self.pos - 1;
        if close_pos > code.pos {
            self.push_text(code, close_pos);
        }
        let close = Mark {
            pos: close_pos,
            line: self.line,
            column: self.column - 1,
        };
        self.push(TokenKind::ExprEnd, close, close_pos, self.pos);
        Ok(())
    }

    /// Skip JavaScript until every frame on `frames` is closed. Braces inside
    /// strings, template literals and comments do not count.
    fn skip_js(&mut self, mut frames: Vec<JsFrame>) -> Result<(), ()> {
        while let Some(frame) = frames.last_mut() {
            if self.is_at_end() {
                return Err(());
            }
            let b = self.peek();
            match frame {
                JsFrame::Code { depth } => match b {
                    b'{' => {
                        *depth += 1;
                        self.advance();
                    }
                    b'}' => {
                        if *depth == 0 {
                            frames.pop();
                        } else {
                            *depth -= 1;
                        }
                        self.advance();
                    }
                    b'"' | b'\'' => self.skip_string(b),
                    b'`' => {
                        self.advance();
                        frames.push(JsFrame::Template);
                    }
                    b'/' if self.peek_at(1) == b'/' => {
                        while !self.is_at_end() && self.peek() != b'\n' {
                            self.advance();
                        }
                    }
                    b'/' if self.peek_at(1) == b'*' => {
                        self.advance_by(2);
                        match self.source[self.pos..].find("*/") {
                            Some(i) => self.advance_to(self.pos + i + 2),
                            None => return Err(()),
                        }
                    }
                    _ => self.advance(),
                },
                JsFrame::Template => match b {
                    b'\\' => self.advance_by(2),
                    b'`' => {
                        frames.pop();
                        self.advance();
                    }
                    b'$' if self.peek_at(1) == b'{' => {
                        self.advance_by(2);
                        frames.push(JsFrame::Code { depth: 0 });
                    }
                    _ => self.advance(),
                },
            }
        }
        Ok(())
    }

    /// Skip a quoted JS string. A string cannot span lines, so a quote with no
    /// closing partner on its line is treated as literal text (an apostrophe
    /// in markup nested inside the expression).
    fn skip_string(&mut self, quote: u8) {
        let start = self.mark();
        self.advance();
        while !self.is_at_end() {
            match self.peek() {
                b'\\' => self.advance_by(2),
                b'\n' => break,
                b if b == quote => {
                    self.advance();
                    return;
                }
                _ => self.advance(),
            }
        }
        self.reset(start);
        self.advance();
    }

    // --- Code fences ---

    /// Whether the cursor sits at the start of a line opening a code fence.
    fn at_fence_start(&self) -> bool {
        let at_line_start = self.pos == 0 || self.bytes[self.pos - 1] == b'\n';
        at_line_start && fence_run(self.bytes, self.pos).is_some()
    }

    /// Scan a fenced code block. The opening line is emitted as
    /// `CodeFenceStart`, the body as `Text`, the closing run as
    /// `CodeFenceEnd`, and trailing whitespace on the closing line as a
    /// separate `Text`.
    fn scan_code_fence(&mut self) -> Result<(), CompileError> {
        let start = self.mark();
        let Some((fence_char, fence_len, run_end)) = fence_run(self.bytes, self.pos) else {
            return Ok(());
        };
        let line_end = self.source[run_end..]
            .find('\n')
            .map_or(self.bytes.len(), |i| run_end + i);
        self.advance_to(line_end);
        self.push(
            TokenKind::CodeFenceStart,
            start,
            start.pos,
            trim_cr(self.source, start.pos, line_end),
        );

        let unterminated = |scanner: &Self| {
            scanner.error_at(
                "unterminated-fence",
                format!(
                    "Code fence was left open, expected a closing `{}`",
                    (fence_char as char).to_string().repeat(fence_len)
                ),
                start.pos,
                scanner.bytes.len(),
            )
        };
        if self.is_at_end() {
            return Err(unterminated(self));
        }
        self.advance();

        let body = self.mark();
        loop {
            if self.is_at_end() {
                return Err(unterminated(self));
            }
            if let Some((ch, len, close_end)) = fence_run(self.bytes, self.pos) {
                let rest_end = self.source[close_end..]
                    .find('\n')
                    .map_or(self.bytes.len(), |i| close_end + i);
                let closes = ch == fence_char
                    && len >= fence_len
                    && self.source[close_end..rest_end].trim().is_empty();
                if closes {
                    let body_end = trim_cr(self.source, body.pos, self.pos.saturating_sub(1));
                    if body_end > body.pos {
                        self.push_text(body, body_end);
                    }
                    let close = self.mark();
                    self.advance_to(close_end);
                    self.push(TokenKind::CodeFenceEnd, close, close.pos, close_end);

                    let trailing = self.mark();
                    let trailing_end = (rest_end + 1).min(self.bytes.len());
                    if trailing_end > close_end {
                        self.advance_to(trailing_end);
                        self.push(TokenKind::Text, trailing, close_end, trailing_end);
                    }
                    return Ok(());
                }
            }
            match self.source[self.pos..].find('\n') {
                Some(i) => self.advance_to(self.pos + i + 1),
                None => self.advance_to(self.bytes.len()),
            }
        }
    }

    // --- Text ---

    /// Scan text up to the next tag, expression or line-leading code fence.
    fn scan_text(&mut self) {
        let start = self.mark();
        while !self.is_at_end() {
            match self.peek() {
                b'<' if self.starts_tag() => break,
                b'{' => break,
                b'\n' => {
                    self.advance();
                    if self.at_fence_start() {
                        break;
                    }
                }
                _ => self.advance(),
            }
        }
        if self.pos > start.pos {
            self.push(TokenKind::Text, start, start.pos, self.pos);
        }
    }

    // --- Helpers ---

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.column = mark.column;
    }

    /// Push a token whose span starts at `mark` and whose raw text is
    /// `source[raw_start..raw_end]`.
    fn push(&mut self, kind: TokenKind, mark: Mark, raw_start: usize, raw_end: usize) {
        let end = self.pos.max(raw_end);
        self.tokens.push(Token::new(
            kind,
            Span::new(mark.pos, end, mark.line, mark.column),
            &self.source[raw_start..raw_end],
        ));
    }

    /// Push a `Text` token spanning exactly `mark.pos..end`, for text that
    /// ends behind the cursor.
    fn push_text(&mut self, mark: Mark, end: usize) {
        self.tokens.push(Token::new(
            TokenKind::Text,
            Span::new(mark.pos, end, mark.line, mark.column),
            &self.source[mark.pos..end],
        ));
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn matches(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn advance(&mut self) {
        let Some(&b) = self.bytes.get(self.pos) else {
            return;
        };
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            // continuation bytes of a multi-byte char do not start a column
            self.column += 1;
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn advance_to(&mut self, target: usize) {
        while self.pos < target && !self.is_at_end() {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_ascii_whitespace() {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn error_at(
        &self,
        code: &'static str,
        message: impl Into<String>,
        start: usize,
        end: usize,
    ) -> CompileError {
        CompileError::new(code, message, self.source, start, end)
    }

    fn unterminated_tag(&self, start: usize, name: &str) -> CompileError {
        self.error_at(
            "unterminated-tag",
            format!("<{name}> was left open, expected `>`"),
            start,
            self.bytes.len(),
        )
    }

    fn unterminated_expression(&self, start: usize) -> CompileError {
        self.error_at(
            "unterminated-expression",
            "Expression was left open, expected `}`",
            start,
            self.bytes.len(),
        )
    }
}

/// Length of a line at `at` that is exactly `---`, including its terminator.
fn fence_line_len(source: &str, at: usize) -> Option<usize> {
    let rest = &source[at..];
    if rest.starts_with("---\n") {
        Some(4)
    } else if rest.starts_with("---\r\n") {
        Some(5)
    } else {
        None
    }
}

/// A code fence run at the start of a line: up to three spaces of indent,
/// then three or more backticks or tildes. Returns the fence character, the
/// run length and the offset just past the run.
fn fence_run(bytes: &[u8], line_start: usize) -> Option<(u8, usize, usize)> {
    let mut i = line_start;
    while i < bytes.len() && bytes[i] == b' ' && i - line_start < 3 {
        i += 1;
    }
    let ch = *bytes.get(i)?;
    if ch != b'`' && ch != b'~' {
        return None;
    }
    let run_start = i;
    while i < bytes.len() && bytes[i] == ch {
        i += 1;
    }
    let len = i - run_start;
    (len >= 3).then_some((ch, len, i))
}

/// Find `</name` (ASCII case-insensitive) followed by whitespace or `>`.
fn find_end_tag(bytes: &[u8], from: usize, name: &str) -> Option<usize> {
    let name = name.as_bytes();
    let mut i = from;
    while i + 2 + name.len() <= bytes.len() {
        if bytes[i] == b'<'
            && bytes[i + 1] == b'/'
            && bytes[i + 2..i + 2 + name.len()].eq_ignore_ascii_case(name)
        {
            let after = bytes.get(i + 2 + name.len()).copied().unwrap_or(b'>');
            if after == b'>' || after.is_ascii_whitespace() {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Drop a trailing `\r` from `source[start..end]`, returning the new end.
fn trim_cr(source: &str, start: usize, end: usize) -> usize {
    if end > start && source.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    }
}

/// Tag names start with a letter and continue with letters, digits, `-`,
/// `_`, `.` (namespaced components) or `:` (`astro:*`, `svg:*`).
fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
