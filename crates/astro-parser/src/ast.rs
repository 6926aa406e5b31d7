//! Abstract Syntax Tree for Astro templates.
//!
//! Every node records the byte range it was parsed from. Synthetic nodes
//! produced by transform passes have `start == end`.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Whole-file result
// ---------------------------------------------------------------------------

/// A parsed `.astro` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ast {
    pub html: Fragment,
    pub frontmatter: Option<Frontmatter>,
    pub css: Vec<StyleBlock>,
    pub js: Vec<ScriptBlock>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Root container of the template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Fragment {
    pub children: Vec<Node>,
}

/// The `---` fenced code block at the top of the file. `code` is returned
/// byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frontmatter {
    pub code: String,
    pub start: usize,
    pub end: usize,
}

/// A top-level `<style>` hoisted out of the template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleBlock {
    pub attributes: Vec<Attribute>,
    pub content: String,
    pub start: usize,
    pub end: usize,
}

/// A top-level `<script>` hoisted out of the template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptBlock {
    pub attributes: Vec<Attribute>,
    pub content: String,
    pub start: usize,
    pub end: usize,
}

/// A non-fatal finding attached to an otherwise successful parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Info,
}

// ---------------------------------------------------------------------------
// Template nodes
// ---------------------------------------------------------------------------

/// A node in the template tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Node {
    Element(Element),
    Text(Text),
    Expression(Expression),
    Comment(Comment),
    CodeFence(CodeFence),
    Doctype(Doctype),
}

impl Node {
    pub fn start(&self) -> usize {
        match self {
            Node::Element(n) => n.start,
            Node::Text(n) => n.start,
            Node::Expression(n) => n.start,
            Node::Comment(n) => n.start,
            Node::CodeFence(n) => n.start,
            Node::Doctype(n) => n.start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            Node::Element(n) => n.end,
            Node::Text(n) => n.end,
            Node::Expression(n) => n.end,
            Node::Comment(n) => n.end,
            Node::CodeFence(n) => n.end,
            Node::Doctype(n) => n.end,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An HTML element or component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub start: usize,
    pub end: usize,
}

impl Element {
    /// Components start with an uppercase letter or use a dotted name.
    pub fn is_component(&self) -> bool {
        self.name.starts_with(|c: char| c.is_ascii_uppercase()) || self.name.contains('.')
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Children are freed through a heap worklist, so dropping an arbitrarily
/// deep tree uses constant stack.
impl Drop for Element {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(node) = pending.pop() {
            if let Node::Element(mut el) = node {
                pending.append(&mut el.children);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub data: String,
    pub start: usize,
    pub end: usize,
}

/// An embedded `{...}` expression. The span covers the braces; `code` is
/// the opaque text between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub code: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub data: String,
    pub start: usize,
    pub end: usize,
}

/// A fenced code block copied verbatim. `metadata` is the trimmed rest of
/// the opening fence line (usually a language id).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeFence {
    pub raw: String,
    pub metadata: String,
    pub data: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Doctype {
    pub value: String,
    pub start: usize,
    pub end: usize,
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    pub value: AttributeValue,
    pub start: usize,
    pub end: usize,
}

/// The syntactic form an attribute was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKind {
    /// `name="value"`, `name='value'` or `name=value`
    Quoted,
    /// `name`
    Empty,
    /// `name={expr}`
    Expression,
    /// `{...expr}`
    Spread,
    /// `{name}`
    Shorthand,
    /// `` name=`value` ``
    TemplateLiteral,
}

/// Serialized as a string, `true`, or an expression object.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    True,
    Expression(Expression),
}

impl Serialize for AttributeValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttributeValue::Text(text) => serializer.serialize_str(text),
            AttributeValue::True => serializer.serialize_bool(true),
            AttributeValue::Expression(expr) => expr.serialize(serializer),
        }
    }
}
