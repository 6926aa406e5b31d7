//! Template parser for Astro.
//!
//! Consumes the flat token stream from `astro-lexer` and builds an [`Ast`].
//! Element nesting is tracked on an explicit stack rather than the native
//! call stack, so deeply nested templates cannot overflow it.

use astro_lexer::{is_raw_text_element, is_void_element, Scanner, Token, TokenKind};

use crate::ast::{
    Ast, Attribute, AttributeKind, AttributeValue, CodeFence, Comment, Diagnostic, Doctype,
    Element, Expression, Fragment, Frontmatter, Node, ScriptBlock, Severity, StyleBlock, Text,
};
use crate::html::closing_tag_omitted;
use crate::ParseError;

/// The element most recently closed without an end tag, kept so a later
/// stray `</tag>` can explain what happened.
#[derive(Debug)]
struct AutoClosed {
    tag: String,
    by: String,
    /// Stack depth left after the auto-close; forgotten once the stack
    /// unwinds below it.
    depth: usize,
}

/// Astro template parser.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    stack: Vec<Element>,
    root: Vec<Node>,
    frontmatter: Option<Frontmatter>,
    css: Vec<StyleBlock>,
    js: Vec<ScriptBlock>,
    diagnostics: Vec<Diagnostic>,
    last_auto_closed: Option<AutoClosed>,
}

impl<'a> Parser<'a> {
    /// Create a parser over tokens scanned from `source`.
    pub fn new(source: &'a str, tokens: Vec<Token<'a>>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            stack: Vec::new(),
            root: Vec::new(),
            frontmatter: None,
            css: Vec::new(),
            js: Vec::new(),
            diagnostics: Vec::new(),
            last_auto_closed: None,
        }
    }

    /// Scan and parse source code into an AST.
    pub fn parse_source(source: &'a str) -> Result<Ast, ParseError> {
        let tokens = Scanner::tokenize(source)?;
        Parser::new(source, tokens).parse()
    }

    /// Parse the token stream into an AST.
    pub fn parse(mut self) -> Result<Ast, ParseError> {
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Frontmatter => {
                    self.frontmatter = Some(Frontmatter {
                        code: token.raw.to_string(),
                        start: token.span.start,
                        end: token.span.end,
                    });
                }
                TokenKind::Doctype => self.push_node(Node::Doctype(Doctype {
                    value: token.raw.to_string(),
                    start: token.span.start,
                    end: token.span.end,
                })),
                TokenKind::Text => self.push_node(Node::Text(Text {
                    data: token.raw.to_string(),
                    start: token.span.start,
                    end: token.span.end,
                })),
                TokenKind::Comment => self.push_node(Node::Comment(Comment {
                    data: token.raw.to_string(),
                    start: token.span.start,
                    end: token.span.end,
                })),
                TokenKind::ExprStart => {
                    let expr = self.parse_expression(token);
                    self.push_node(Node::Expression(expr));
                }
                TokenKind::CodeFenceStart => {
                    let fence = self.parse_code_fence(token);
                    self.push_node(Node::CodeFence(fence));
                }
                TokenKind::TagOpen => self.parse_element(token)?,
                TokenKind::TagClose => self.parse_close_tag(token)?,
                // Attribute-level tokens never reach content context
                _ => {}
            }
        }

        self.close_remaining()?;
        log::debug!(
            "parsed {} top-level nodes, {} style and {} script blocks",
            self.root.len(),
            self.css.len(),
            self.js.len()
        );

        Ok(Ast {
            html: Fragment {
                children: self.root,
            },
            frontmatter: self.frontmatter,
            css: self.css,
            js: self.js,
            diagnostics: self.diagnostics,
        })
    }

    // =========================================================================
    // Content nodes
    // =========================================================================

    /// `ExprStart [Text] ExprEnd` into one node spanning both braces.
    fn parse_expression(&mut self, open: Token<'a>) -> Expression {
        let mut code = "";
        if self.peek().kind == TokenKind::Text {
            code = self.advance().raw;
        }
        let mut end = open.span.end;
        if self.peek().kind == TokenKind::ExprEnd {
            end = self.advance().span.end;
        }
        Expression {
            code: code.to_string(),
            start: open.span.start,
            end,
        }
    }

    /// `CodeFenceStart [Text] CodeFenceEnd` into one verbatim node.
    fn parse_code_fence(&mut self, open: Token<'a>) -> CodeFence {
        let metadata = open
            .raw
            .trim_start()
            .trim_start_matches(['`', '~'])
            .trim()
            .to_string();
        let mut data = "";
        if self.peek().kind == TokenKind::Text {
            data = self.advance().raw;
        }
        let mut end = open.span.end;
        if self.peek().kind == TokenKind::CodeFenceEnd {
            end = self.advance().span.end;
        }
        CodeFence {
            raw: self.source[open.span.start..end].to_string(),
            metadata,
            data: data.to_string(),
            start: open.span.start,
            end,
        }
    }

    // =========================================================================
    // Elements
    // =========================================================================

    /// Parse an element from its `TagOpen` token through `>` or `/>`, plus
    /// the body of raw-text elements.
    fn parse_element(&mut self, open: Token<'a>) -> Result<(), ParseError> {
        let name = tag_name(open.raw);

        let omitted = self
            .stack
            .last()
            .is_some_and(|top| closing_tag_omitted(&top.name, Some(name)));
        if omitted {
            if let Some(mut el) = self.stack.pop() {
                el.end = open.span.start;
                self.last_auto_closed = Some(AutoClosed {
                    tag: el.name.clone(),
                    by: name.to_string(),
                    depth: self.stack.len(),
                });
                self.push_node(Node::Element(el));
            }
        }

        let attributes = self.parse_attributes()?;
        let end = self.advance();
        let self_closing = end.kind == TokenKind::TagSelfClose;

        let mut element = Element {
            name: name.to_string(),
            attributes,
            children: Vec::new(),
            start: open.span.start,
            end: end.span.end,
        };

        if !self_closing && is_raw_text_element(name) {
            let mut content = "";
            if self.peek().kind == TokenKind::Text {
                let text = self.advance();
                content = text.raw;
                element.children.push(Node::Text(Text {
                    data: text.raw.to_string(),
                    start: text.span.start,
                    end: text.span.end,
                }));
            }
            if self.peek().kind == TokenKind::TagClose {
                element.end = self.advance().span.end;
            }
            if !self.hoist(&element, content) {
                self.push_node(Node::Element(element));
            }
            return Ok(());
        }

        if self_closing || is_void_element(name) {
            self.push_node(Node::Element(element));
        } else {
            self.stack.push(element);
        }
        Ok(())
    }

    /// Move a top-level `<style>` or `<script>` into the AST's side lists.
    /// Returns false when the element stays in the template.
    fn hoist(&mut self, element: &Element, content: &str) -> bool {
        if !self.stack.is_empty() || element.attribute("is:inline").is_some() {
            return false;
        }
        if element.name.eq_ignore_ascii_case("style") {
            self.css.push(StyleBlock {
                attributes: element.attributes.clone(),
                content: content.to_string(),
                start: element.start,
                end: element.end,
            });
            true
        } else if element.name.eq_ignore_ascii_case("script") {
            self.js.push(ScriptBlock {
                attributes: element.attributes.clone(),
                content: content.to_string(),
                start: element.start,
                end: element.end,
            });
            true
        } else {
            false
        }
    }

    /// Read attributes up to (not including) the token finishing the tag.
    /// Names must be unique within a tag; spreads are exempt.
    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, ParseError> {
        let mut attributes: Vec<Attribute> = Vec::new();
        loop {
            let token = self.peek();
            let attribute = match token.kind {
                TokenKind::AttrName => {
                    self.advance();
                    self.parse_attribute(token)
                }
                TokenKind::ExprStart => {
                    self.advance();
                    let expr = self.parse_expression(token);
                    expression_attribute(expr)
                }
                _ => return Ok(attributes),
            };
            let duplicate = attribute.kind != AttributeKind::Spread
                && attributes
                    .iter()
                    .any(|a| a.kind != AttributeKind::Spread && a.name == attribute.name);
            if duplicate {
                return Err(ParseError::new(
                    "duplicate-attribute",
                    "Attributes need to be unique".to_string(),
                    self.source,
                    attribute.start,
                    attribute.end,
                ));
            }
            attributes.push(attribute);
        }
    }

    /// `name` or `name=value`.
    fn parse_attribute(&mut self, name: Token<'a>) -> Attribute {
        if self.peek().kind != TokenKind::AttrValue {
            return Attribute {
                name: name.raw.to_string(),
                kind: AttributeKind::Empty,
                value: AttributeValue::True,
                start: name.span.start,
                end: name.span.end,
            };
        }

        let value = self.advance();
        let raw = value.raw;
        let (kind, value_node) = match raw.as_bytes().first() {
            Some(b'"' | b'\'') => (
                AttributeKind::Quoted,
                AttributeValue::Text(strip_delimiters(raw).to_string()),
            ),
            Some(b'`') => (
                AttributeKind::TemplateLiteral,
                AttributeValue::Text(strip_delimiters(raw).to_string()),
            ),
            Some(b'{') => (
                AttributeKind::Expression,
                AttributeValue::Expression(Expression {
                    code: strip_delimiters(raw).to_string(),
                    start: value.span.start,
                    end: value.span.end,
                }),
            ),
            _ => (AttributeKind::Quoted, AttributeValue::Text(raw.to_string())),
        };

        Attribute {
            name: name.raw.to_string(),
            kind,
            value: value_node,
            start: name.span.start,
            end: value.span.end,
        }
    }

    /// Handle `</name>`: pop the matching element, auto-closing anything
    /// still open above it.
    fn parse_close_tag(&mut self, close: Token<'a>) -> Result<(), ParseError> {
        let name = tag_name(close.raw);

        if is_void_element(name) {
            return Err(self.error(
                "invalid-void-content",
                format!("<{name}> is a void element and cannot have children, or a closing tag"),
                close,
            ));
        }

        let Some(index) = self.stack.iter().rposition(|el| names_match(&el.name, name)) else {
            let message = match &self.last_auto_closed {
                Some(auto) if names_match(&auto.tag, name) => format!(
                    "</{name}> attempted to close <{name}> that was already automatically closed by <{}>",
                    auto.by
                ),
                _ => format!("</{name}> attempted to close an element that was not open"),
            };
            return Err(self.error("invalid-closing-tag", message, close));
        };

        while self.stack.len() > index + 1 {
            let Some(mut el) = self.stack.pop() else {
                break;
            };
            if !closing_tag_omitted(&el.name, None) {
                self.diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    code: "implicitly-closed",
                    message: format!("<{}> was implicitly closed by </{name}>", el.name),
                    start: el.start,
                    end: close.span.start,
                });
            }
            el.end = close.span.start;
            self.push_node(Node::Element(el));
        }

        if let Some(mut el) = self.stack.pop() {
            el.end = close.span.end;
            self.push_node(Node::Element(el));
        }
        self.forget_stale_auto_close();
        Ok(())
    }

    fn forget_stale_auto_close(&mut self) {
        if self
            .last_auto_closed
            .as_ref()
            .is_some_and(|auto| self.stack.len() < auto.depth)
        {
            self.last_auto_closed = None;
        }
    }

    /// Close elements still open at end of input.
    fn close_remaining(&mut self) -> Result<(), ParseError> {
        while let Some(mut el) = self.stack.pop() {
            if !closing_tag_omitted(&el.name, None) {
                let name = el.name.clone();
                let start = el.start;
                return Err(ParseError::new(
                    "unclosed-element",
                    format!("<{name}> was left open"),
                    self.source,
                    start,
                    start + name.len() + 1,
                ));
            }
            el.end = self.source.len();
            self.push_node(Node::Element(el));
            self.forget_stale_auto_close();
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Append a completed node to the innermost open element, or the root.
    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn peek(&self) -> Token<'a> {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .copied()
            .unwrap_or_else(|| eof(self.source))
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, code: &'static str, message: String, at: Token<'a>) -> ParseError {
        ParseError::new(code, message, self.source, at.span.start, at.span.end)
    }
}

/// `<>` is shorthand for `<Fragment>`.
fn tag_name(raw: &str) -> &str {
    if raw.is_empty() {
        "Fragment"
    } else {
        raw
    }
}

/// HTML tag names compare case-insensitively, component names exactly.
fn names_match(open: &str, close: &str) -> bool {
    let is_html = open.starts_with(|c: char| c.is_ascii_lowercase()) && !open.contains('.');
    open == close || (is_html && open.eq_ignore_ascii_case(close))
}

/// Strip one leading and one trailing delimiter from a raw attribute value.
fn strip_delimiters(raw: &str) -> &str {
    if raw.len() >= 2 {
        &raw[1..raw.len() - 1]
    } else {
        ""
    }
}

/// A tag-level `{...spread}` or `{shorthand}`.
fn expression_attribute(expr: Expression) -> Attribute {
    let code = expr.code.trim();
    match code.strip_prefix("...") {
        Some(spread) => Attribute {
            name: spread.trim().to_string(),
            kind: AttributeKind::Spread,
            start: expr.start,
            end: expr.end,
            value: AttributeValue::Expression(expr),
        },
        None => Attribute {
            name: code.to_string(),
            kind: AttributeKind::Shorthand,
            start: expr.start,
            end: expr.end,
            value: AttributeValue::Expression(expr),
        },
    }
}

fn eof(source: &str) -> Token<'_> {
    let end = source.len();
    Token::new(
        TokenKind::Eof,
        astro_lexer::Span::new(end, end, 1, 1),
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Ast {
        Parser::parse_source(source).unwrap()
    }

    fn error_code(source: &str) -> &'static str {
        Parser::parse_source(source).unwrap_err().code
    }

    /// Compact outline of the tree: `name[child,child]`, `"text"`, `{code}`.
    fn outline(nodes: &[Node]) -> String {
        nodes
            .iter()
            .map(|node| match node {
                Node::Element(el) if el.children.is_empty() => el.name.clone(),
                Node::Element(el) => format!("{}[{}]", el.name, outline(&el.children)),
                Node::Text(t) => format!("{:?}", t.data),
                Node::Expression(e) => format!("{{{}}}", e.code),
                Node::Comment(c) => format!("<!--{}-->", c.data),
                Node::CodeFence(f) => format!("fence({})", f.metadata),
                Node::Doctype(d) => format!("!doctype {}", d.value),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn first_element(ast: &Ast) -> &Element {
        ast.html.children[0].as_element().unwrap()
    }

    // =========================================================================
    // Basic structure
    // =========================================================================

    #[test]
    fn test_empty() {
        let ast = parse("");
        assert!(ast.html.children.is_empty());
        assert!(ast.frontmatter.is_none());
    }

    #[test]
    fn test_nested_elements() {
        let ast = parse("<div><p>hi</p><span>{x}</span></div>");
        assert_eq!(outline(&ast.html.children), "div[p[\"hi\"],span[{x}]]");
    }

    #[test]
    fn test_element_spans() {
        let ast = parse("<div><p>hi</p></div>");
        let div = first_element(&ast);
        assert_eq!((div.start, div.end), (0, 20));
        let p = div.children[0].as_element().unwrap();
        assert_eq!((p.start, p.end), (5, 14));
    }

    #[test]
    fn test_frontmatter_is_captured_verbatim() {
        let ast = parse("---\nconst { title } = Astro.props;\n---\n<h1>{title}</h1>");
        let fm = ast.frontmatter.unwrap();
        assert_eq!(fm.code, "const { title } = Astro.props;\n");
        assert_eq!(fm.start, 0);
        assert_eq!(outline(&ast.html.children), "h1[{title}]");
    }

    #[test]
    fn test_fragment_shorthand() {
        let ast = parse("<><b>a</b></>");
        assert_eq!(outline(&ast.html.children), "Fragment[b[\"a\"]]");
    }

    #[test]
    fn test_comment_and_doctype() {
        let ast = parse("<!doctype html><!-- c --><html></html>");
        assert_eq!(outline(&ast.html.children), "!doctype html,<!-- c -->,html");
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[test]
    fn test_attribute_kinds() {
        let ast = parse(r#"<Comp a="1" b c={d} {...rest} {e} f=`g${h}` i=j />"#);
        let el = first_element(&ast);
        let kinds: Vec<(&str, AttributeKind)> = el
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", AttributeKind::Quoted),
                ("b", AttributeKind::Empty),
                ("c", AttributeKind::Expression),
                ("rest", AttributeKind::Spread),
                ("e", AttributeKind::Shorthand),
                ("f", AttributeKind::TemplateLiteral),
                ("i", AttributeKind::Quoted),
            ]
        );
        assert_eq!(el.attributes[0].value, AttributeValue::Text("1".into()));
        assert_eq!(el.attributes[1].value, AttributeValue::True);
        assert_eq!(el.attributes[5].value, AttributeValue::Text("g${h}".into()));
        assert_eq!(el.attributes[6].value, AttributeValue::Text("j".into()));
    }

    #[test]
    fn test_duplicate_attribute() {
        let err = Parser::parse_source(r#"<div a="1" a="2"></div>"#).unwrap_err();
        assert_eq!(err.code, "duplicate-attribute");
        assert_eq!(err.start.offset, 11);
        assert_eq!(error_code("<div {a} a></div>"), "duplicate-attribute");
    }

    #[test]
    fn test_repeated_spreads_allowed() {
        let ast = parse("<Comp {...a} {...a} b />");
        assert_eq!(first_element(&ast).attributes.len(), 3);
    }

    #[test]
    fn test_attribute_expression_span() {
        let ast = parse("<a href={url}>x</a>");
        let attr = &first_element(&ast).attributes[0];
        assert_eq!((attr.start, attr.end), (3, 13));
        let AttributeValue::Expression(expr) = &attr.value else {
            panic!("expected expression");
        };
        assert_eq!(expr.code, "url");
        assert_eq!((expr.start, expr.end), (8, 13));
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    #[test]
    fn test_balanced_expression_is_one_node() {
        let ast = parse("{ {a:1} }");
        assert_eq!(ast.html.children.len(), 1);
        let Node::Expression(expr) = &ast.html.children[0] else {
            panic!("expected expression");
        };
        assert_eq!(expr.code, " {a:1} ");
        assert_eq!((expr.start, expr.end), (0, 9));
    }

    #[test]
    fn test_balanced_attribute_expression() {
        let ast = parse("<div data={ {a:1} }></div>");
        let attr = &first_element(&ast).attributes[0];
        assert_eq!(attr.value, AttributeValue::Expression(Expression {
            code: " {a:1} ".into(),
            start: 10,
            end: 19,
        }));
    }

    #[test]
    fn test_empty_expression() {
        let ast = parse("{}");
        assert_eq!(outline(&ast.html.children), "{}");
    }

    // =========================================================================
    // Implicit closing
    // =========================================================================

    #[test]
    fn test_li_implicitly_closed_by_li() {
        let ast = parse("<ul><li>one<li>two</ul>");
        assert_eq!(outline(&ast.html.children), "ul[li[\"one\"],li[\"two\"]]");
        assert!(ast.diagnostics.is_empty());
    }

    #[test]
    fn test_implicit_close_spans() {
        let ast = parse("<ul><li>one<li>two</ul>");
        let ul = first_element(&ast);
        let first = ul.children[0].as_element().unwrap();
        let second = ul.children[1].as_element().unwrap();
        assert_eq!((first.start, first.end), (4, 11));
        assert_eq!((second.start, second.end), (11, 18));
        assert_eq!(ul.end, 23);
    }

    #[test]
    fn test_every_omitted_closing_pair_yields_siblings() {
        let pairs: &[(&str, &[&str])] = &[
            ("li", &["li"]),
            ("dt", &["dt", "dd"]),
            ("dd", &["dt", "dd"]),
            (
                "p",
                &[
                    "address", "article", "aside", "blockquote", "div", "dl", "fieldset",
                    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup",
                    "main", "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
                ],
            ),
            ("rt", &["rt", "rp"]),
            ("rp", &["rt", "rp"]),
            ("optgroup", &["optgroup"]),
            ("option", &["option", "optgroup"]),
            ("thead", &["tbody", "tfoot"]),
            ("tbody", &["tbody", "tfoot"]),
            ("tfoot", &["tbody"]),
            ("tr", &["tr", "tbody"]),
            ("td", &["td", "th", "tr"]),
            ("th", &["td", "th", "tr"]),
        ];
        for (current, nexts) in pairs {
            for next in *nexts {
                let source = format!("<section><{current}>a<{next}>b</{next}></section>");
                let ast = parse(&source);
                assert_eq!(
                    outline(&ast.html.children),
                    format!("section[{current}[\"a\"],{next}[\"b\"]]"),
                    "{current} -> {next}"
                );
            }
        }
    }

    #[test]
    fn test_p_closed_by_hr_void() {
        let ast = parse("<div><p>a<hr>b</div>");
        assert_eq!(outline(&ast.html.children), "div[p[\"a\"],hr,\"b\"]");
    }

    #[test]
    fn test_p_not_closed_by_inline() {
        let ast = parse("<p>a<span>b</span></p>");
        assert_eq!(outline(&ast.html.children), "p[\"a\",span[\"b\"]]");
    }

    #[test]
    fn test_close_tag_auto_closes_omitted_chain() {
        let ast = parse("<table><tr><td>a</table>");
        assert_eq!(outline(&ast.html.children), "table[tr[td[\"a\"]]]");
        assert!(ast.diagnostics.is_empty());
        let table = first_element(&ast);
        let tr = table.children[0].as_element().unwrap();
        let td = tr.children[0].as_element().unwrap();
        assert_eq!((tr.start, tr.end), (7, 16));
        assert_eq!((td.start, td.end), (11, 16));
        assert_eq!((table.start, table.end), (0, 24));
    }

    #[test]
    fn test_omitted_close_at_eof() {
        let ast = parse("<li>one");
        assert_eq!(outline(&ast.html.children), "li[\"one\"]");
        assert_eq!(first_element(&ast).end, 7);
    }

    // =========================================================================
    // Mismatched and void closing tags
    // =========================================================================

    #[test]
    fn test_close_auto_closes_to_matching_ancestor() {
        let ast = parse("<div><span></div>");
        assert_eq!(outline(&ast.html.children), "div[span]");
        assert_eq!(ast.diagnostics.len(), 1);
        assert_eq!(ast.diagnostics[0].code, "implicitly-closed");
        assert_eq!(ast.diagnostics[0].severity, Severity::Warning);
        let span = first_element(&ast).children[0].as_element().unwrap();
        assert_eq!((span.start, span.end), (5, 11));
    }

    #[test]
    fn test_close_without_open_element() {
        let err = Parser::parse_source("<div></span></div>").unwrap_err();
        assert_eq!(err.code, "invalid-closing-tag");
        assert_eq!(err.start.offset, 5);
    }

    #[test]
    fn test_close_after_auto_close_explains() {
        let err = Parser::parse_source("<p>a<div>b</div></p>").unwrap_err();
        assert_eq!(err.code, "invalid-closing-tag");
        assert!(err.message.contains("already automatically closed by <div>"));
    }

    #[test]
    fn test_auto_close_forgotten_after_unwinding() {
        let err = Parser::parse_source("<section><p>a<div>b</div></section></p>").unwrap_err();
        assert_eq!(err.code, "invalid-closing-tag");
        assert_eq!(err.message, "</p> attempted to close an element that was not open");
    }

    #[test]
    fn test_void_closing_tag() {
        assert_eq!(error_code("<input></input>"), "invalid-void-content");
    }

    #[test]
    fn test_void_elements_do_not_nest() {
        let ast = parse("<div><img src=a.png><br>text</div>");
        assert_eq!(outline(&ast.html.children), "div[img,br,\"text\"]");
    }

    #[test]
    fn test_unclosed_element() {
        let err = Parser::parse_source("<div><span>").unwrap_err();
        assert_eq!(err.code, "unclosed-element");
        assert_eq!(err.start.offset, 5);
    }

    #[test]
    fn test_scanner_errors_surface() {
        assert_eq!(error_code("<div>{oops</div>"), "unterminated-expression");
    }

    #[test]
    fn test_deep_nesting_uses_no_recursion() {
        let depth = 5000;
        let source = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let ast = parse(&source);
        let mut node = &ast.html.children[0];
        let mut seen = 1;
        while let Node::Element(el) = node {
            match el.children.first() {
                Some(child @ Node::Element(_)) => {
                    node = child;
                    seen += 1;
                }
                _ => break,
            }
        }
        assert_eq!(seen, depth);
    }

    #[test]
    fn test_deep_tree_drops_on_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(512 * 1024)
            .spawn(|| {
                let depth = 100_000;
                let source = format!("{}{}", "<div>".repeat(depth), "</div>".repeat(depth));
                let ast = parse(&source);
                let count = ast.html.children.len();
                drop(ast);
                count
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), 1);
    }

    // =========================================================================
    // Style and script hoisting
    // =========================================================================

    #[test]
    fn test_top_level_style_and_script_hoisted() {
        let ast = parse("<style>h1{color:red}</style><script>let a = '<b>';</script><h1>x</h1>");
        assert_eq!(ast.css.len(), 1);
        assert_eq!(ast.css[0].content, "h1{color:red}");
        assert_eq!(ast.js.len(), 1);
        assert_eq!(ast.js[0].content, "let a = '<b>';");
        assert_eq!(outline(&ast.html.children), "h1[\"x\"]");
    }

    #[test]
    fn test_second_top_level_style_is_allowed() {
        let ast = parse("<style>a{}</style><style>b{}</style>");
        assert_eq!(ast.css.len(), 2);
    }

    #[test]
    fn test_inline_and_nested_scripts_stay() {
        let ast = parse("<script is:inline>1</script><div><style>p{}</style></div>");
        assert!(ast.js.is_empty());
        assert!(ast.css.is_empty());
        assert_eq!(outline(&ast.html.children), "script[\"1\"],div[style[\"p{}\"]]");
    }

    // =========================================================================
    // Code fences
    // =========================================================================

    #[test]
    fn test_code_fence_not_parsed_as_markup() {
        let source = "```md\n# Article 0\n\nLorem.\n\n![image 0](../../image.jpg)\n```\n";
        let ast = parse(source);
        let Node::CodeFence(fence) = &ast.html.children[0] else {
            panic!("expected code fence");
        };
        assert_eq!(fence.metadata, "md");
        assert_eq!(fence.data, "# Article 0\n\nLorem.\n\n![image 0](../../image.jpg)");
        assert_eq!(fence.raw, &source[..source.len() - 1]);
        assert_eq!(
            ast.html.children[1],
            Node::Text(Text {
                data: "\n".into(),
                start: source.len() - 1,
                end: source.len(),
            })
        );
    }

    #[test]
    fn test_code_fence_inside_element() {
        let ast = parse("<div>\n```\n<b>{x}</b>\n```\n</div>");
        assert_eq!(outline(&ast.html.children), "div[\"\\n\",fence(),\"\\n\"]");
    }

    // =========================================================================
    // Positions
    // =========================================================================

    #[test]
    fn test_sibling_spans_monotonic() {
        let ast = parse("---\na\n---\n<a>1</a> <b>{2}</b><!--3-->\n<c/>");
        let mut prev = 0;
        for node in &ast.html.children {
            assert!(node.start() <= node.end());
            assert!(node.start() >= prev);
            prev = node.end();
        }
    }

    #[test]
    fn test_serializes_to_json() {
        let ast = parse("<p class=\"a\">{b}</p>");
        let json = serde_json::to_value(&ast).unwrap();
        assert_eq!(json["html"]["children"][0]["type"], "Element");
        assert_eq!(json["html"]["children"][0]["attributes"][0]["kind"], "quoted");
        assert_eq!(json["html"]["children"][0]["children"][0]["code"], "b");
    }
}
