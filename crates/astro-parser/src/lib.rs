//! Astro Parser
//!
//! Builds an AST from the token stream produced by `astro-lexer`, applying
//! HTML void-element and implicit-closing rules. Top-level `<style>` and
//! `<script>` blocks and the `---` frontmatter are captured separately.
//!
//! [`Compiler`] wraps scanning, parsing and the [`transform`] passes behind a
//! per-instance cache.

pub mod ast;
pub mod compiler;
pub mod html;
pub mod parser;
pub mod transform;

pub use ast::{Ast, Attribute, AttributeKind, AttributeValue, Element, Fragment, Node};
pub use compiler::{CompileOptions, Compiler};
pub use html::closing_tag_omitted;
pub use parser::Parser;
pub use transform::{InjectDoctype, InjectHeadScript, Transform};

/// Scanner and parser failures share one error type.
pub type ParseError = astro_lexer::CompileError;
