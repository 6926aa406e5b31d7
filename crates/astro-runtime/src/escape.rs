//! HTML escaping and element printing.

use std::fmt::Write as _;

/// Elements printed as `<name />` when they have no children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Escape text content: `&`, `<`, `>`, `"` and `'`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a double-quoted attribute value.
pub fn to_attribute_string(value: &str) -> String {
    value.replace('&', "&#38;").replace('"', "&#34;")
}

/// An element to print into `<head>` or around an island.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsrElement {
    pub props: Vec<(String, String)>,
    pub children: String,
}

impl SsrElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.push((key.into(), value.into()));
        self
    }

    pub fn children(mut self, children: impl Into<String>) -> Self {
        self.children = children.into();
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Print `<name props...>children</name>`. Attribute values are escaped
/// when `escape` is set; children are written as-is.
pub fn render_element(name: &str, element: &SsrElement, escape: bool) -> String {
    let mut out = format!("<{name}");
    for (key, value) in &element.props {
        // `lang` and `define:vars` are compile-time only
        if key == "lang" || key == "define:vars" {
            continue;
        }
        let value = if escape {
            to_attribute_string(value)
        } else {
            value.clone()
        };
        let _ = write!(out, " {key}=\"{value}\"");
    }
    if element.children.is_empty() && VOID_ELEMENTS.contains(&name) {
        out.push_str(" />");
    } else {
        let _ = write!(out, ">{}</{name}>", element.children);
    }
    out
}
