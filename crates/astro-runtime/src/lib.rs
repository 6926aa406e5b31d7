//! Astro Runtime
//!
//! The server-side half of the component contract: turns a tree of
//! component factories into an ordered stream of HTML chunks and render
//! instructions.
//!
//! - [`render`] walks factories, slots and nested templates in document
//!   order and streams the output through a bounded channel
//! - [`instruction`] defines the instructions interleaved with HTML and how
//!   a writer resolves them
//! - [`props`] is the tagged wire format for props passed to hydrated
//!   islands
//! - [`hydration`], [`head`] and [`csp`] produce the markup those
//!   instructions expand to
//!
//! # Example
//!
//! ```
//! use astro_runtime::props::{deserialize_props, serialize_props, Props};
//!
//! let props = Props::new().with("count", 1);
//! let wire = serialize_props(&props);
//! assert_eq!(wire, r#"{"count":[0,1]}"#);
//! assert_eq!(deserialize_props(&wire).unwrap(), props);
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod csp;
pub mod escape;
pub mod head;
pub mod hydration;
pub mod instruction;
pub mod props;
pub mod render;
pub mod result;
pub mod shorthash;

pub use instruction::{stringify_chunk, Chunk, HydrationMetadata, Island, RenderInstruction};
pub use props::{PropValue, Props};
pub use render::{
    render_page, render_to_string, AstroComponent, Component, ComponentFactory,
    ComponentInvocation, FactoryReturnValue, FrameworkComponent, PageOutcome, PropagationHint,
    RenderStream, RenderedMarkup, Renderer, Response, Slots, TemplatePart, TemplateResult,
};
pub use result::{RenderContext, RenderOptions, SsrResult};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from reviving serialized props.
#[derive(Debug, thiserror::Error)]
pub enum PropsError {
    #[error("props are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown prop type tag {0}")]
    UnknownTag(u64),

    #[error("malformed {kind} payload")]
    Payload { kind: &'static str },

    #[error("invalid date `{0}`")]
    InvalidDate(String),

    #[error("invalid bigint `{0}`")]
    InvalidBigInt(String),
}

/// Errors surfaced while rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A component factory or renderer failed.
    #[error("failed to render <{name}>: {source}")]
    Component {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("<{name}> uses an invalid hydration directive `client:{directive}`, expected one of {valid}")]
    InvalidDirective {
        name: String,
        directive: String,
        valid: String,
    },

    #[error("`client:{directive}` on <{name}> requires a value")]
    MissingDirectiveValue { name: String, directive: String },

    #[error("no renderer claimed <{name}>{}", .extension.as_ref().map(|e| format!(" (.{e})")).unwrap_or_default())]
    NoMatchingRenderer {
        name: String,
        extension: Option<String>,
    },

    #[error("<{name}> uses `client:only` but no renderer could be inferred, pass one like `client:only=\"{hint}\"`")]
    NoClientOnlyHint { name: String, hint: String },

    #[error(transparent)]
    Props(#[from] PropsError),

    #[error("render was aborted")]
    Aborted,

    #[error("render task failed: {0}")]
    Join(String),
}

impl RenderError {
    /// Wrap an arbitrary failure raised while rendering component `name`.
    pub fn component(
        name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        RenderError::Component {
            name: name.into(),
            source: source.into(),
        }
    }
}
