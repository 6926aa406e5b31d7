//! Document-order rendering of template results.
//!
//! Every part is fully rendered before its next sibling starts, so chunks
//! leave the engine in document order no matter how long any awaited part
//! takes.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::factory::FactoryReturnValue;
use super::renderer::Renderer;
use super::slots::Slots;
use super::template::{Component, ComponentInvocation, FrameworkComponent, TemplatePart, TemplateResult};
use crate::escape::escape_html;
use crate::hydration::{
    extract_directives, island_uid, render_island, unrendered_slot_templates, ExtractedProps,
    HydrationDirective,
};
use crate::instruction::{stringify_chunk, Chunk, HydrationMetadata, Island, RenderInstruction};
use crate::props::{serialize_props, Props};
use crate::result::{RenderContext, SsrResult};
use crate::{BoxFuture, RenderError};

/// Where rendered chunks go.
pub(crate) enum Sink {
    Channel(mpsc::Sender<Chunk>),
    Buffer(Vec<Chunk>),
}

impl Sink {
    async fn send(&mut self, chunk: Chunk) -> Result<(), RenderError> {
        match self {
            Sink::Channel(tx) => tx.send(chunk).await.map_err(|_| RenderError::Aborted),
            Sink::Buffer(chunks) => {
                chunks.push(chunk);
                Ok(())
            }
        }
    }

    async fn send_html(&mut self, html: String) -> Result<(), RenderError> {
        if html.is_empty() {
            return Ok(());
        }
        self.send(Chunk::Html(html)).await
    }
}

pub(crate) fn render_template<'a>(
    result: &'a Arc<SsrResult>,
    template: TemplateResult,
    sink: &'a mut Sink,
) -> BoxFuture<'a, Result<(), RenderError>> {
    Box::pin(async move {
        for part in template.into_parts() {
            render_part(result, part, sink).await?;
        }
        Ok(())
    })
}

fn render_part<'a>(
    result: &'a Arc<SsrResult>,
    part: TemplatePart,
    sink: &'a mut Sink,
) -> BoxFuture<'a, Result<(), RenderError>> {
    Box::pin(async move {
        match part {
            TemplatePart::Html(html) => sink.send_html(html).await,
            TemplatePart::Text(text) => sink.send_html(escape_html(&text)).await,
            TemplatePart::Instruction(instruction) => {
                if matches!(
                    instruction,
                    RenderInstruction::RenderHead | RenderInstruction::MaybeRenderHead
                ) {
                    result.mark_head_emitted();
                }
                sink.send(Chunk::Instruction(instruction)).await
            }
            TemplatePart::Template(template) => render_template(result, template, sink).await,
            TemplatePart::Component(invocation) => render_component(result, *invocation, sink).await,
            TemplatePart::Await(future) => {
                let part = future.await?;
                render_part(result, part, sink).await
            }
        }
    })
}

async fn render_component(
    result: &Arc<SsrResult>,
    invocation: ComponentInvocation,
    sink: &mut Sink,
) -> Result<(), RenderError> {
    let ComponentInvocation {
        display_name,
        component,
        props,
        slots,
        prepared,
    } = invocation;
    match component {
        Component::Fragment => render_template(result, slots.render("default"), sink).await,
        Component::Astro(factory) => {
            let value = match prepared {
                Some(value) => value,
                None => factory.call(Arc::clone(result), props, slots).await?,
            };
            render_factory_value(result, &display_name, value, sink).await
        }
        Component::Framework(framework) => {
            render_framework(result, &display_name, framework, props, slots, sink).await
        }
    }
}

async fn render_factory_value(
    result: &Arc<SsrResult>,
    display_name: &str,
    value: FactoryReturnValue,
    sink: &mut Sink,
) -> Result<(), RenderError> {
    match value {
        FactoryReturnValue::Template(template) => render_template(result, template, sink).await,
        FactoryReturnValue::Response(response) => {
            log::debug!(
                "<{display_name}> returned a {} response inside a page, subtree suppressed",
                response.status
            );
            Ok(())
        }
        FactoryReturnValue::HeadAndContent { head, content } => {
            if result.head_emitted() {
                log::debug!("<{display_name}> head content arrived after the head, dropped");
            } else {
                let head = render_to_html(result, head).await?;
                result.add_extra_head(head);
            }
            render_template(result, content, sink).await
        }
        FactoryReturnValue::ThinHead => Ok(()),
    }
}

/// Render `template` and resolve its instructions immediately.
pub(crate) async fn render_to_html(
    result: &Arc<SsrResult>,
    template: TemplateResult,
) -> Result<String, RenderError> {
    let mut sink = Sink::Buffer(Vec::new());
    render_template(result, template, &mut sink).await?;
    let Sink::Buffer(chunks) = sink else {
        return Ok(String::new());
    };
    Ok(chunks
        .iter()
        .map(|chunk| stringify_chunk(result, chunk))
        .collect())
}

/// Render a slot for a framework component: markup as a string, with any
/// instructions it raised hoisted out.
async fn render_slot(
    result: &Arc<SsrResult>,
    template: TemplateResult,
) -> Result<(String, Vec<RenderInstruction>), RenderError> {
    let mut sink = Sink::Buffer(Vec::new());
    render_template(result, template, &mut sink).await?;
    let mut html = String::new();
    let mut instructions = Vec::new();
    if let Sink::Buffer(chunks) = sink {
        for chunk in chunks {
            match chunk {
                Chunk::Html(s) => html.push_str(&s),
                Chunk::Instruction(RenderInstruction::Directive(island)) => {
                    html.push_str(&render_island(&island));
                    instructions.push(RenderInstruction::Prescripts {
                        directive: island.metadata.directive,
                    });
                }
                Chunk::Instruction(i) => instructions.push(i),
            }
        }
    }
    Ok((html, instructions))
}

async fn render_framework(
    result: &Arc<SsrResult>,
    display_name: &str,
    component: FrameworkComponent,
    props: Props,
    slots: Slots,
    sink: &mut Sink,
) -> Result<(), RenderError> {
    let ExtractedProps { props, hydration } =
        extract_directives(display_name, props, result.options())?;

    let mut children: Vec<(String, String)> = Vec::new();
    let mut instructions = Vec::new();
    for name in slots.names() {
        let (html, mut raised) = render_slot(result, slots.render(name)).await?;
        instructions.append(&mut raised);
        children.push((name.to_string(), html));
    }

    let client_only = hydration.as_ref().is_some_and(|h| h.directive == "only");
    let renderer =
        select_renderer(result.context(), display_name, &component, &props, hydration.as_ref()).await?;

    let (html, attrs) = if client_only {
        let fallback = children
            .iter()
            .find(|(name, _)| name == "fallback")
            .map(|(_, html)| html.clone())
            .unwrap_or_default();
        (fallback, Vec::new())
    } else {
        let markup = renderer
            .render_to_static_markup(&component, &props, &children)
            .await?;
        (markup.html, markup.attrs)
    };

    for instruction in instructions {
        sink.send(Chunk::Instruction(instruction)).await?;
    }

    let Some(hydration) = hydration else {
        return sink.send_html(html).await;
    };

    let component_url = hydration
        .component_url
        .unwrap_or_else(|| component.component_url.clone());
    let component_export = hydration
        .component_export
        .unwrap_or_else(|| component.component_export.clone());
    let serialized = serialize_props(&props);
    let uid = island_uid(&component_export, &component_url, &html, &serialized);
    let templates = unrendered_slot_templates(&html, &children);

    let island = Island {
        uid,
        metadata: HydrationMetadata {
            directive: hydration.directive,
            value: hydration.value,
            component_export,
            component_url,
            display_name: display_name.to_string(),
            props: serialized,
        },
        renderer_url: renderer.client_entrypoint().map(String::from),
        attributes: attrs,
        children: html + &templates,
    };
    sink.send(Chunk::Instruction(RenderInstruction::Directive(Box::new(island))))
        .await
}

async fn select_renderer(
    context: &RenderContext,
    display_name: &str,
    component: &FrameworkComponent,
    props: &Props,
    hydration: Option<&HydrationDirective>,
) -> Result<Arc<dyn Renderer>, RenderError> {
    let renderers = &context.renderers;
    let by_name = |name: &str| {
        renderers
            .iter()
            .find(|r| r.name() == name || r.name() == format!("@astrojs/{name}"))
            .cloned()
    };

    if let Some(hydration) = hydration.filter(|h| h.directive == "only") {
        if let Some(renderer) = hydration.value.as_deref().and_then(by_name) {
            return Ok(renderer);
        }
        if let [only] = renderers.as_slice() {
            return Ok(Arc::clone(only));
        }
        if let Some(renderer) = component.extension().and_then(by_name) {
            return Ok(renderer);
        }
        let hint = renderers
            .first()
            .map(|r| r.name().trim_start_matches("@astrojs/").to_string())
            .unwrap_or_else(|| "react".to_string());
        return Err(RenderError::NoClientOnlyHint {
            name: display_name.to_string(),
            hint,
        });
    }

    if let Some(renderer) = component.renderer.as_deref().and_then(by_name) {
        return Ok(renderer);
    }
    for renderer in renderers {
        if renderer.check(component, props).await {
            return Ok(Arc::clone(renderer));
        }
    }
    Err(RenderError::NoMatchingRenderer {
        name: display_name.to_string(),
        extension: component.extension().map(String::from),
    })
}
