//! Component factories and what they return.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::slots::Slots;
use super::template::TemplateResult;
use crate::props::Props;
use crate::result::SsrResult;
use crate::{BoxFuture, RenderError};

/// How a component takes part in head propagation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropagationHint {
    #[default]
    None,
    /// The component itself contributes head content.
    #[serde(rename = "self")]
    SelfHint,
    /// Something below the component contributes head content.
    InTree,
}

/// A compiled Astro component.
pub trait ComponentFactory: Send + Sync {
    fn name(&self) -> &str;

    fn call(
        &self,
        result: Arc<SsrResult>,
        props: Props,
        slots: Slots,
    ) -> BoxFuture<'static, Result<FactoryReturnValue, RenderError>>;

    /// Module the component was compiled from, used to look up metadata.
    fn module_id(&self) -> Option<&str> {
        None
    }

    /// Explicit propagation hint, overriding the metadata table.
    fn propagation(&self) -> Option<PropagationHint> {
        None
    }
}

/// What a factory produces.
pub enum FactoryReturnValue {
    Template(TemplateResult),
    /// Ends the render when returned by the page; suppresses the subtree
    /// when returned by a nested component.
    Response(Response),
    /// Content plus markup that belongs in the page `<head>`.
    HeadAndContent {
        head: TemplateResult,
        content: TemplateResult,
    },
    /// Head-only component that renders nothing in the body.
    ThinHead,
}

impl From<TemplateResult> for FactoryReturnValue {
    fn from(template: TemplateResult) -> Self {
        FactoryReturnValue::Template(template)
    }
}

impl From<Response> for FactoryReturnValue {
    fn from(response: Response) -> Self {
        FactoryReturnValue::Response(response)
    }
}

impl fmt::Debug for FactoryReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryReturnValue::Template(t) => f.debug_tuple("Template").field(t).finish(),
            FactoryReturnValue::Response(r) => f.debug_tuple("Response").field(r).finish(),
            FactoryReturnValue::HeadAndContent { head, content } => f
                .debug_struct("HeadAndContent")
                .field("head", head)
                .field("content", content)
                .finish(),
            FactoryReturnValue::ThinHead => f.write_str("ThinHead"),
        }
    }
}

/// An HTTP response returned in place of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn redirect(location: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            headers: vec![("Location".to_string(), location.into())],
            body: String::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type RenderFn = dyn Fn(Arc<SsrResult>, Props, Slots) -> BoxFuture<'static, Result<FactoryReturnValue, RenderError>>
    + Send
    + Sync;

/// A [`ComponentFactory`] backed by a closure.
///
/// ```
/// use astro_runtime::{AstroComponent, TemplateResult};
///
/// let hello = AstroComponent::new("Hello", |_result, props, _slots| async move {
///     let name = props.get("name").and_then(|v| v.as_str()).unwrap_or("world").to_string();
///     Ok(TemplateResult::new().html("<p>Hello, ").text(name).html("</p>").into())
/// });
/// ```
pub struct AstroComponent {
    name: String,
    module_id: Option<String>,
    propagation: Option<PropagationHint>,
    render: Box<RenderFn>,
}

impl AstroComponent {
    pub fn new<F, Fut>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(Arc<SsrResult>, Props, Slots) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FactoryReturnValue, RenderError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            module_id: None,
            propagation: None,
            render: Box::new(move |result, props, slots| Box::pin(render(result, props, slots))),
        }
    }

    pub fn with_module_id(mut self, module_id: impl Into<String>) -> Self {
        self.module_id = Some(module_id.into());
        self
    }

    pub fn with_propagation(mut self, hint: PropagationHint) -> Self {
        self.propagation = Some(hint);
        self
    }

    pub fn into_factory(self) -> Arc<dyn ComponentFactory> {
        Arc::new(self)
    }
}

impl ComponentFactory for AstroComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(
        &self,
        result: Arc<SsrResult>,
        props: Props,
        slots: Slots,
    ) -> BoxFuture<'static, Result<FactoryReturnValue, RenderError>> {
        (self.render)(result, props, slots)
    }

    fn module_id(&self) -> Option<&str> {
        self.module_id.as_deref()
    }

    fn propagation(&self) -> Option<PropagationHint> {
        self.propagation
    }
}

impl fmt::Debug for AstroComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstroComponent")
            .field("name", &self.name)
            .field("module_id", &self.module_id)
            .field("propagation", &self.propagation)
            .finish_non_exhaustive()
    }
}
