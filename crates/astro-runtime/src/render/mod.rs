//! Render engine: component factories, templates, slots and page streaming.

mod engine;
mod factory;
mod page;
mod propagation;
mod renderer;
mod slots;
mod template;

pub use factory::{AstroComponent, ComponentFactory, FactoryReturnValue, PropagationHint, Response};
pub use page::{render_page, render_to_string, PageOutcome, RenderStream};
pub use propagation::{get_propagation_hint, is_a_propagating_component};
pub use renderer::{RenderedMarkup, Renderer};
pub use slots::Slots;
pub use template::{Component, ComponentInvocation, FrameworkComponent, TemplatePart, TemplateResult};
