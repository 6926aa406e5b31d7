//! Template results: the ordered parts a component renders.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::factory::{ComponentFactory, FactoryReturnValue};
use super::slots::Slots;
use crate::instruction::RenderInstruction;
use crate::props::Props;
use crate::{BoxFuture, RenderError};

/// One piece of a template, rendered in order.
pub enum TemplatePart {
    /// Trusted markup, written as-is.
    Html(String),
    /// Text that is HTML-escaped on output.
    Text(String),
    Instruction(RenderInstruction),
    Component(Box<ComponentInvocation>),
    Template(TemplateResult),
    /// Content that is not ready yet, e.g. an awaited expression.
    Await(BoxFuture<'static, Result<TemplatePart, RenderError>>),
}

impl fmt::Debug for TemplatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplatePart::Html(html) => f.debug_tuple("Html").field(html).finish(),
            TemplatePart::Text(text) => f.debug_tuple("Text").field(text).finish(),
            TemplatePart::Instruction(i) => f.debug_tuple("Instruction").field(i).finish(),
            TemplatePart::Component(c) => f.debug_tuple("Component").field(c).finish(),
            TemplatePart::Template(t) => f.debug_tuple("Template").field(t).finish(),
            TemplatePart::Await(_) => f.write_str("Await(..)"),
        }
    }
}

/// The output of an Astro component's template.
#[derive(Debug, Default)]
pub struct TemplateResult {
    parts: Vec<TemplatePart>,
}

impl TemplateResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(self, html: impl Into<String>) -> Self {
        self.part(TemplatePart::Html(html.into()))
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.part(TemplatePart::Text(text.into()))
    }

    pub fn instruction(self, instruction: RenderInstruction) -> Self {
        self.part(TemplatePart::Instruction(instruction))
    }

    pub fn component(self, invocation: ComponentInvocation) -> Self {
        self.part(TemplatePart::Component(Box::new(invocation)))
    }

    pub fn template(self, template: TemplateResult) -> Self {
        self.part(TemplatePart::Template(template))
    }

    /// Content produced by `future`, rendered in this position once ready.
    pub fn suspend<F>(self, future: F) -> Self
    where
        F: Future<Output = Result<TemplatePart, RenderError>> + Send + 'static,
    {
        self.part(TemplatePart::Await(Box::pin(future)))
    }

    pub fn part(mut self, part: TemplatePart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn push(&mut self, part: TemplatePart) {
        self.parts.push(part);
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn parts_mut(&mut self) -> std::slice::IterMut<'_, TemplatePart> {
        self.parts.iter_mut()
    }

    pub(crate) fn into_parts(self) -> Vec<TemplatePart> {
        self.parts
    }
}

/// What a component tag resolves to.
#[derive(Clone)]
pub enum Component {
    Astro(Arc<dyn ComponentFactory>),
    /// `<Fragment>`: renders its default slot.
    Fragment,
    /// A component rendered by a framework [`Renderer`](super::Renderer).
    Framework(FrameworkComponent),
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Astro(factory) => f.debug_tuple("Astro").field(&factory.name()).finish(),
            Component::Fragment => f.write_str("Fragment"),
            Component::Framework(c) => f.debug_tuple("Framework").field(c).finish(),
        }
    }
}

/// A framework component as referenced by compiled output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameworkComponent {
    pub component_url: String,
    pub component_export: String,
    /// Renderer the component was tagged with, if any.
    pub renderer: Option<String>,
}

impl FrameworkComponent {
    pub fn new(component_url: impl Into<String>) -> Self {
        Self {
            component_url: component_url.into(),
            component_export: "default".to_string(),
            renderer: None,
        }
    }

    pub fn with_export(mut self, export: impl Into<String>) -> Self {
        self.component_export = export.into();
        self
    }

    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }

    /// File extension of the component module, e.g. `jsx`.
    pub fn extension(&self) -> Option<&str> {
        let file = self.component_url.rsplit('/').next()?;
        file.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// A component tag inside a template.
#[derive(Debug)]
pub struct ComponentInvocation {
    pub display_name: String,
    pub component: Component,
    pub props: Props,
    pub slots: Slots,
    /// Factory output produced ahead of time by head propagation.
    pub(crate) prepared: Option<FactoryReturnValue>,
}

impl ComponentInvocation {
    pub fn new(display_name: impl Into<String>, component: Component) -> Self {
        Self {
            display_name: display_name.into(),
            component,
            props: Props::new(),
            slots: Slots::new(),
            prepared: None,
        }
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_slots(mut self, slots: Slots) -> Self {
        self.slots = slots;
        self
    }
}
