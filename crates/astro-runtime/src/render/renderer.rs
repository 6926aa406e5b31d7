//! Framework renderer interface.

use super::template::FrameworkComponent;
use crate::props::Props;
use crate::{BoxFuture, RenderError};

/// Markup a renderer produced for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkup {
    pub html: String,
    /// Extra attributes for the surrounding `<astro-island>`.
    pub attrs: Vec<(String, String)>,
}

impl RenderedMarkup {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            attrs: Vec::new(),
        }
    }
}

/// Server side of a UI framework integration (React, Svelte, ...).
pub trait Renderer: Send + Sync {
    /// Package name, e.g. `@astrojs/react`.
    fn name(&self) -> &str;

    /// Client module that hydrates this renderer's islands.
    fn client_entrypoint(&self) -> Option<&str> {
        None
    }

    /// Whether this renderer can render `component`.
    fn check<'a>(&'a self, component: &'a FrameworkComponent, props: &'a Props) -> BoxFuture<'a, bool>;

    /// Render to HTML. `slots` holds each slot's already rendered markup.
    fn render_to_static_markup<'a>(
        &'a self,
        component: &'a FrameworkComponent,
        props: &'a Props,
        slots: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<RenderedMarkup, RenderError>>;
}
