//! Render instructions and the chunk stream.
//!
//! A render produces [`Chunk`]s: trusted HTML strings interleaved with
//! instructions that can only be resolved against per-render state at the
//! moment they are written.

use crate::head;
use crate::hydration;
use crate::result::SsrResult;

/// A deferred action resolved by the writer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderInstruction {
    /// Print every collected head element, even if the head was printed.
    RenderHead,
    /// Print collected head elements unless they were already printed.
    MaybeRenderHead,
    /// Print hydration prescripts followed by the island element.
    Directive(Box<Island>),
    /// Print only the prescripts for `directive`. Raised by islands whose
    /// markup was already inlined into a framework component's slot.
    Prescripts { directive: String },
}

/// One unit of render output.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Html(String),
    Instruction(RenderInstruction),
}

impl Chunk {
    pub fn html(html: impl Into<String>) -> Self {
        Chunk::Html(html.into())
    }
}

impl From<RenderInstruction> for Chunk {
    fn from(instruction: RenderInstruction) -> Self {
        Chunk::Instruction(instruction)
    }
}

/// What the client needs to hydrate one island.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationMetadata {
    /// Directive name without the `client:` prefix.
    pub directive: String,
    /// Directive argument, e.g. the media query of `client:media`.
    pub value: Option<String>,
    pub component_export: String,
    pub component_url: String,
    pub display_name: String,
    /// Props in wire format, see [`crate::props::serialize_props`].
    pub props: String,
}

/// A server-rendered framework component awaiting hydration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Island {
    pub uid: String,
    pub metadata: HydrationMetadata,
    pub renderer_url: Option<String>,
    /// Extra attributes contributed by the renderer.
    pub attributes: Vec<(String, String)>,
    /// Server-rendered markup, empty for `client:only`.
    pub children: String,
}

/// Resolve one chunk to the text that goes on the wire.
pub fn stringify_chunk(result: &SsrResult, chunk: &Chunk) -> String {
    match chunk {
        Chunk::Html(html) => html.clone(),
        Chunk::Instruction(RenderInstruction::RenderHead) => head::render_all_head_content(result),
        Chunk::Instruction(RenderInstruction::MaybeRenderHead) => head::maybe_render_head(result),
        Chunk::Instruction(RenderInstruction::Directive(island)) => {
            let mut out = hydration::prescripts(result, &island.metadata.directive);
            out.push_str(&hydration::render_island(island));
            out
        }
        Chunk::Instruction(RenderInstruction::Prescripts { directive }) => {
            hydration::prescripts(result, directive)
        }
    }
}
