//! AST transform passes.
//!
//! Each pass is one visit over the template tree, driven by an explicit
//! work stack, and is idempotent: applying it twice leaves the same tree as
//! applying it once.

use crate::ast::{
    Ast, Attribute, AttributeKind, AttributeValue, Doctype, Element, Node,
};

/// A mutating pass over a parsed [`Ast`].
pub trait Transform {
    fn name(&self) -> &'static str;
    fn apply(&self, ast: &mut Ast);
}

/// Inserts `<!doctype html>` before the first `<html>` element unless the
/// template already has a doctype.
#[derive(Debug, Default, Clone, Copy)]
pub struct InjectDoctype;

impl Transform for InjectDoctype {
    fn name(&self) -> &'static str {
        "inject-doctype"
    }

    fn apply(&self, ast: &mut Ast) {
        let mut html_path = None;
        for (path, node) in Walk::new(&ast.html.children) {
            match node {
                Node::Doctype(_) => return,
                Node::Element(el) if html_path.is_none() && el.name.eq_ignore_ascii_case("html") => {
                    html_path = Some(path);
                }
                _ => {}
            }
        }
        let Some(path) = html_path else {
            return;
        };
        let Some((&index, parent_path)) = path.split_last() else {
            return;
        };
        let Some(siblings) = children_mut(&mut ast.html.children, parent_path) else {
            return;
        };
        let at = siblings[index].start();
        siblings.insert(
            index,
            Node::Doctype(Doctype {
                value: "html".to_string(),
                start: at,
                end: at,
            }),
        );
        log::trace!("inserted doctype before <html>");
    }
}

/// Appends `<script type="module" src={src}>` to the first `<head>`.
#[derive(Debug, Clone)]
pub struct InjectHeadScript {
    pub src: String,
}

impl InjectHeadScript {
    pub fn new(src: impl Into<String>) -> Self {
        Self { src: src.into() }
    }

    fn is_injected(&self, node: &Node) -> bool {
        let Node::Element(el) = node else {
            return false;
        };
        el.name == "script"
            && el
                .attribute("src")
                .is_some_and(|a| a.value == AttributeValue::Text(self.src.clone()))
    }
}

impl Transform for InjectHeadScript {
    fn name(&self) -> &'static str {
        "inject-head-script"
    }

    fn apply(&self, ast: &mut Ast) {
        let head_path = Walk::new(&ast.html.children)
            .find(|(_, node)| matches!(node, Node::Element(el) if el.name == "head"))
            .map(|(path, _)| path);
        let Some(path) = head_path else {
            return;
        };
        let Some(Node::Element(head)) = node_mut(&mut ast.html.children, &path) else {
            return;
        };
        if head.children.iter().any(|child| self.is_injected(child)) {
            return;
        }
        let at = head.children.last().map_or(head.start, Node::end);
        head.children.push(Node::Element(Element {
            name: "script".to_string(),
            attributes: vec![
                synthetic_attribute("type", "module", at),
                synthetic_attribute("src", &self.src, at),
            ],
            children: Vec::new(),
            start: at,
            end: at,
        }));
        log::trace!("injected head script {}", self.src);
    }
}

fn synthetic_attribute(name: &str, value: &str, at: usize) -> Attribute {
    Attribute {
        name: name.to_string(),
        kind: AttributeKind::Quoted,
        value: AttributeValue::Text(value.to_string()),
        start: at,
        end: at,
    }
}

// ---------------------------------------------------------------------------
// Tree walking
// ---------------------------------------------------------------------------

/// Pre-order (document order) iterator yielding each node with its index
/// path from the root.
struct Walk<'n> {
    stack: Vec<(Vec<usize>, &'n Node)>,
}

impl<'n> Walk<'n> {
    fn new(roots: &'n [Node]) -> Self {
        let stack = roots
            .iter()
            .enumerate()
            .rev()
            .map(|(i, node)| (vec![i], node))
            .collect();
        Self { stack }
    }
}

impl<'n> Iterator for Walk<'n> {
    type Item = (Vec<usize>, &'n Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        if let Node::Element(el) = node {
            for (i, child) in el.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                self.stack.push((child_path, child));
            }
        }
        Some((path, node))
    }
}

/// Children list of the element at `path` (the root list for an empty path).
fn children_mut<'n>(mut nodes: &'n mut Vec<Node>, path: &[usize]) -> Option<&'n mut Vec<Node>> {
    for &i in path {
        match nodes.get_mut(i)? {
            Node::Element(el) => nodes = &mut el.children,
            _ => return None,
        }
    }
    Some(nodes)
}

fn node_mut<'n>(nodes: &'n mut Vec<Node>, path: &[usize]) -> Option<&'n mut Node> {
    let (&last, parent) = path.split_last()?;
    children_mut(nodes, parent)?.get_mut(last)
}
