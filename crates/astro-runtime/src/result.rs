//! Render configuration and per-render state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::csp::{CspOptions, CspState};
use crate::escape::SsrElement;
use crate::render::{PropagationHint, Renderer};

/// Site-wide render options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Hydration directives accepted as `client:<name>`.
    pub client_directives: Vec<String>,
    pub client_scripts: ClientScripts,
    pub csp: Option<CspOptions>,
    /// Chunks buffered between the render task and the consumer.
    pub channel_capacity: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            client_directives: ["load", "idle", "visible", "media", "only"]
                .map(String::from)
                .to_vec(),
            client_scripts: ClientScripts::default(),
            csp: None,
            channel_capacity: 32,
        }
    }
}

/// Client bootstrap code inlined ahead of the first island.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientScripts {
    /// Defines the `astro-island` custom element.
    pub island: String,
    /// Loader per directive name.
    pub directives: BTreeMap<String, String>,
}

/// Propagation hints for compiled modules, keyed by module id.
pub type ComponentMetadata = FxHashMap<String, PropagationHint>;

/// Everything shared read-only by all renders of a site.
pub struct RenderContext {
    pub options: RenderOptions,
    pub metadata: ComponentMetadata,
    pub renderers: Vec<Arc<dyn Renderer>>,
}

impl RenderContext {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            metadata: ComponentMetadata::default(),
            renderers: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, module_id: impl Into<String>, hint: PropagationHint) -> Self {
        self.metadata.insert(module_id.into(), hint);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.push(renderer);
        self
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("options", &self.options)
            .field("metadata", &self.metadata)
            .field(
                "renderers",
                &self.renderers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RenderState {
    pub(crate) has_rendered_head: bool,
    /// Set by the render task once a head instruction has been produced,
    /// whether or not the writer has resolved it yet.
    pub(crate) head_emitted: bool,
    pub(crate) has_hydration_script: bool,
    pub(crate) rendered_directives: FxHashSet<String>,
    pub(crate) styles: Vec<SsrElement>,
    pub(crate) scripts: Vec<SsrElement>,
    pub(crate) links: Vec<SsrElement>,
    pub(crate) extra_head: Vec<String>,
    pub(crate) csp: CspState,
}

/// State owned by exactly one render: collected head elements, the
/// head-rendered flag, hydration bookkeeping and CSP hashes.
#[derive(Debug)]
pub struct SsrResult {
    context: Arc<RenderContext>,
    state: Mutex<RenderState>,
}

impl SsrResult {
    pub fn new(context: Arc<RenderContext>) -> Self {
        Self {
            context,
            state: Mutex::default(),
        }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn options(&self) -> &RenderOptions {
        &self.context.options
    }

    pub fn add_style(&self, style: SsrElement) {
        self.state().styles.push(style);
    }

    pub fn add_script(&self, script: SsrElement) {
        self.state().scripts.push(script);
    }

    pub fn add_link(&self, link: SsrElement) {
        self.state().links.push(link);
    }

    /// Raw markup appended after the collected head elements.
    pub fn add_extra_head(&self, html: impl Into<String>) {
        self.state().extra_head.push(html.into());
    }

    pub fn has_rendered_head(&self) -> bool {
        self.state().has_rendered_head
    }

    pub(crate) fn mark_head_emitted(&self) {
        self.state().head_emitted = true;
    }

    /// Whether head content produced now would come after the head in
    /// document order.
    pub(crate) fn head_emitted(&self) -> bool {
        let state = self.state();
        state.head_emitted || state.has_rendered_head
    }

    /// The `Content-Security-Policy` header for everything rendered so far,
    /// or `None` when CSP is not configured.
    pub fn content_security_policy(&self) -> Option<String> {
        let options = self.context.options.csp.as_ref()?;
        Some(self.state().csp.header(options))
    }

    /// Record an inline script for the CSP header.
    pub(crate) fn hash_script(&self, state: &mut RenderState, content: &str) {
        if let Some(options) = &self.context.options.csp {
            state.csp.add_script(options, content);
        }
    }

    /// Record an inline style for the CSP header.
    pub(crate) fn hash_style(&self, state: &mut RenderState, content: &str) {
        if let Some(options) = &self.context.options.csp {
            state.csp.add_style(options, content);
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
