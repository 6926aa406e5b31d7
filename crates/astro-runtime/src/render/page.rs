//! Page rendering and the chunk stream handed to the writer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::engine::{render_template, render_to_html, Sink};
use super::factory::{ComponentFactory, FactoryReturnValue, Response};
use super::propagation::buffer_head_content;
use super::slots::Slots;
use super::template::TemplateResult;
use crate::instruction::{stringify_chunk, Chunk};
use crate::props::Props;
use crate::result::{RenderContext, SsrResult};
use crate::RenderError;

/// What rendering a page produced.
#[derive(Debug)]
pub enum PageOutcome {
    /// The page returned a response (e.g. a redirect) instead of markup.
    Response(Response),
    Stream(RenderStream),
}

/// Chunks of a page in document order.
///
/// The page renders on a tokio task feeding a bounded channel. Dropping
/// the stream aborts that task.
#[derive(Debug)]
pub struct RenderStream {
    rx: mpsc::Receiver<Chunk>,
    task: Option<JoinHandle<Result<(), RenderError>>>,
    result: Arc<SsrResult>,
}

impl RenderStream {
    /// Per-render state, needed to resolve instructions.
    pub fn result(&self) -> &Arc<SsrResult> {
        &self.result
    }

    /// The next chunk. After the last chunk, a failed render yields its
    /// error once, then `None`.
    pub async fn next(&mut self) -> Option<Result<Chunk, RenderError>> {
        if let Some(chunk) = self.rx.recv().await {
            return Some(Ok(chunk));
        }
        let task = self.task.take()?;
        match task.await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(Err(err)),
            Err(err) => Some(Err(RenderError::Join(err.to_string()))),
        }
    }

    /// Drain the stream, resolving instructions as they arrive.
    pub async fn into_string(mut self) -> Result<String, RenderError> {
        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            out.push_str(&stringify_chunk(&self.result, &chunk?));
        }
        Ok(out)
    }
}

impl Drop for RenderStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                log::debug!("render stream dropped, aborting render task");
            }
            task.abort();
        }
    }
}

/// Render the page component `factory`.
///
/// The page factory runs first: a [`Response`] it returns is handed back
/// as is. Otherwise propagating components are instantiated so their head
/// content is buffered, and the body is streamed.
pub async fn render_page(
    context: Arc<RenderContext>,
    factory: Arc<dyn ComponentFactory>,
    props: Props,
    slots: Slots,
) -> Result<PageOutcome, RenderError> {
    let capacity = context.options.channel_capacity.max(1);
    let result = Arc::new(SsrResult::new(context));
    log::debug!("rendering page <{}>", factory.name());

    let mut template = match factory.call(Arc::clone(&result), props, slots).await? {
        FactoryReturnValue::Response(response) => {
            log::debug!("page <{}> returned a {} response", factory.name(), response.status);
            return Ok(PageOutcome::Response(response));
        }
        FactoryReturnValue::Template(template) => template,
        FactoryReturnValue::HeadAndContent { head, content } => {
            let head = render_to_html(&result, head).await?;
            result.add_extra_head(head);
            content
        }
        FactoryReturnValue::ThinHead => TemplateResult::new(),
    };
    buffer_head_content(&result, &mut template).await?;

    let (tx, rx) = mpsc::channel(capacity);
    let task_result = Arc::clone(&result);
    let task = tokio::spawn(async move {
        let mut sink = Sink::Channel(tx);
        render_template(&task_result, template, &mut sink).await
    });
    Ok(PageOutcome::Stream(RenderStream {
        rx,
        task: Some(task),
        result,
    }))
}

/// Render a page to a single string. A page that returns a response
/// yields the response body.
pub async fn render_to_string(
    context: Arc<RenderContext>,
    factory: Arc<dyn ComponentFactory>,
    props: Props,
    slots: Slots,
) -> Result<String, RenderError> {
    match render_page(context, factory, props, slots).await? {
        PageOutcome::Response(response) => Ok(response.body),
        PageOutcome::Stream(stream) => stream.into_string().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csp::CspOptions;
    use crate::escape::SsrElement;
    use crate::instruction::RenderInstruction;
    use crate::render::{
        AstroComponent, Component, ComponentInvocation, FrameworkComponent, PropagationHint,
        RenderedMarkup, Renderer, TemplatePart,
    };
    use crate::result::RenderOptions;
    use crate::BoxFuture;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn context() -> Arc<RenderContext> {
        Arc::new(RenderContext::default())
    }

    fn page<F>(render: F) -> Arc<dyn ComponentFactory>
    where
        F: Fn() -> TemplateResult + Send + Sync + 'static,
    {
        AstroComponent::new("Page", move |_, _, _| {
            let template = render();
            async move { Ok(template.into()) }
        })
        .into_factory()
    }

    fn astro(factory: Arc<dyn ComponentFactory>) -> ComponentInvocation {
        let name = factory.name().to_string();
        ComponentInvocation::new(name, Component::Astro(factory))
    }

    async fn render(context: Arc<RenderContext>, factory: Arc<dyn ComponentFactory>) -> String {
        render_to_string(context, factory, Props::new(), Slots::new())
            .await
            .unwrap()
    }

    /// Renders `<button>` around the default slot.
    struct TestRenderer;

    impl Renderer for TestRenderer {
        fn name(&self) -> &str {
            "@astrojs/test"
        }

        fn client_entrypoint(&self) -> Option<&str> {
            Some("/client.js")
        }

        fn check<'a>(&'a self, component: &'a FrameworkComponent, _props: &'a Props) -> BoxFuture<'a, bool> {
            Box::pin(async move { component.extension() == Some("test") })
        }

        fn render_to_static_markup<'a>(
            &'a self,
            _component: &'a FrameworkComponent,
            props: &'a Props,
            slots: &'a [(String, String)],
        ) -> BoxFuture<'a, Result<RenderedMarkup, RenderError>> {
            Box::pin(async move {
                let label = props.get("label").and_then(|v| v.as_str()).unwrap_or("");
                let slot = slots
                    .iter()
                    .find(|(name, _)| name == "default")
                    .map(|(_, html)| format!("<astro-slot>{html}</astro-slot>"))
                    .unwrap_or_default();
                Ok(RenderedMarkup::new(format!("<button>{label}{slot}</button>")))
            })
        }
    }

    fn island_context() -> Arc<RenderContext> {
        let mut options = RenderOptions::default();
        options.client_scripts.island = "ISLAND".into();
        options
            .client_scripts
            .directives
            .insert("load".into(), "LOAD".into());
        Arc::new(RenderContext::new(options).with_renderer(Arc::new(TestRenderer)))
    }

    fn counter(props: Props) -> ComponentInvocation {
        ComponentInvocation::new(
            "Counter",
            Component::Framework(FrameworkComponent::new("/src/Counter.test")),
        )
        .with_props(props)
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    #[tokio::test]
    async fn test_document_order_under_delay() {
        let slow = AstroComponent::new("Slow", |_, _, _| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(TemplateResult::new().html("<c>").into())
        })
        .into_factory();
        let factory = page(move || {
            TemplateResult::new()
                .html("<a>")
                .suspend(async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(TemplatePart::Html("<b>".into()))
                })
                .component(astro(Arc::clone(&slow)))
                .html("<d>")
        });
        assert_eq!(render(context(), factory).await, "<a><b><c><d>");
    }

    #[tokio::test]
    async fn test_text_is_escaped() {
        let factory = page(|| TemplateResult::new().html("<p>").text("a < b & c").html("</p>"));
        assert_eq!(render(context(), factory).await, "<p>a &lt; b &amp; c</p>");
    }

    #[tokio::test]
    async fn test_stream_yields_chunks() {
        let factory = page(|| {
            TemplateResult::new()
                .html("<p>")
                .instruction(RenderInstruction::MaybeRenderHead)
                .html("</p>")
        });
        let PageOutcome::Stream(mut stream) =
            render_page(context(), factory, Props::new(), Slots::new()).await.unwrap()
        else {
            panic!("expected a stream");
        };
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        assert_eq!(
            chunks,
            vec![
                Chunk::html("<p>"),
                Chunk::Instruction(RenderInstruction::MaybeRenderHead),
                Chunk::html("</p>"),
            ]
        );
    }

    // ========================================================================
    // Head
    // ========================================================================

    #[tokio::test]
    async fn test_head_rendered_once() {
        let factory = AstroComponent::new("Page", |result, _, _| async move {
            result.add_style(SsrElement::new().children("h1{}"));
            Ok(TemplateResult::new()
                .html("<html><head>")
                .instruction(RenderInstruction::MaybeRenderHead)
                .html("</head><body>")
                .instruction(RenderInstruction::MaybeRenderHead)
                .html("</body></html>")
                .into())
        })
        .into_factory();
        assert_eq!(
            render(context(), factory).await,
            "<html><head><style>h1{}</style></head><body></body></html>"
        );
    }

    #[tokio::test]
    async fn test_propagated_head_lands_in_head() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let seo = AstroComponent::new("Seo", move |_, _, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(FactoryReturnValue::HeadAndContent {
                    head: TemplateResult::new().html("<title>Hi</title>"),
                    content: TemplateResult::new().html("<p>body</p>"),
                })
            }
        })
        .with_module_id("/src/Seo.astro")
        .into_factory();

        let ctx = Arc::new(
            RenderContext::default().with_metadata("/src/Seo.astro", PropagationHint::SelfHint),
        );
        let factory = page(move || {
            TemplateResult::new()
                .html("<html><head>")
                .instruction(RenderInstruction::MaybeRenderHead)
                .html("</head><body>")
                .template(TemplateResult::new().component(astro(Arc::clone(&seo))))
                .html("</body></html>")
        });
        assert_eq!(
            render(ctx, factory).await,
            "<html><head><title>Hi</title></head><body><p>body</p></body></html>"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    async fn late_head_page(delay: u64) -> String {
        let title = AstroComponent::new("Title", |_, _, _| async {
            Ok(FactoryReturnValue::HeadAndContent {
                head: TemplateResult::new().html("<title>T</title>"),
                content: TemplateResult::new().html("<p>x</p>"),
            })
        })
        .into_factory();
        let factory = page(move || {
            TemplateResult::new()
                .html("<head>")
                .instruction(RenderInstruction::MaybeRenderHead)
                .html("</head>")
                .suspend(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(TemplatePart::Html(String::new()))
                })
                .component(astro(Arc::clone(&title)))
        });
        render(context(), factory).await
    }

    #[tokio::test]
    async fn test_late_head_content_independent_of_timing() {
        let fast = late_head_page(0).await;
        let slow = late_head_page(50).await;
        assert_eq!(fast, "<head></head><p>x</p>");
        assert_eq!(slow, fast);
    }

    // ========================================================================
    // Slots and responses
    // ========================================================================

    #[tokio::test]
    async fn test_slots_and_fragment() {
        let layout = AstroComponent::new("Layout", |_, _, slots| async move {
            Ok(TemplateResult::new()
                .html("<main>")
                .template(slots.render("default"))
                .template(slots.render("missing"))
                .html("</main>")
                .into())
        })
        .into_factory();
        let factory = page(move || {
            let fragment = ComponentInvocation::new("Fragment", Component::Fragment).with_slots(
                Slots::new().with("default", || TemplateResult::new().html("<i>f</i>")),
            );
            TemplateResult::new().component(
                astro(Arc::clone(&layout)).with_slots(Slots::new().with("default", move || {
                    TemplateResult::new().html("<p>hi</p>")
                })),
            )
            .component(fragment)
        });
        assert_eq!(render(context(), factory).await, "<main><p>hi</p></main><i>f</i>");
    }

    #[tokio::test]
    async fn test_top_level_redirect() {
        let factory = AstroComponent::new("Page", |_, _, _| async {
            Ok(Response::redirect("/login", 302).into())
        })
        .into_factory();
        let outcome = render_page(context(), factory, Props::new(), Slots::new())
            .await
            .unwrap();
        match outcome {
            PageOutcome::Response(response) => {
                assert_eq!(response.status, 302);
                assert_eq!(response.header("Location"), Some("/login"));
            }
            PageOutcome::Stream(_) => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_nested_response_suppressed() {
        let guard = AstroComponent::new("Guard", |_, _, _| async {
            Ok(Response::redirect("/login", 302).into())
        })
        .into_factory();
        let factory = page(move || {
            TemplateResult::new()
                .html("<a>")
                .component(astro(Arc::clone(&guard)))
                .html("<b>")
        });
        assert_eq!(render(context(), factory).await, "<a><b>");
    }

    #[tokio::test]
    async fn test_component_error_surfaces_after_chunks() {
        let broken = AstroComponent::new("Broken", |_, _, _| async {
            Err(RenderError::component("Broken", "boom"))
        })
        .into_factory();
        let factory = page(move || {
            TemplateResult::new()
                .html("<a>")
                .component(astro(Arc::clone(&broken)))
        });
        let PageOutcome::Stream(mut stream) =
            render_page(context(), factory, Props::new(), Slots::new()).await.unwrap()
        else {
            panic!("expected a stream");
        };
        assert_eq!(stream.next().await.unwrap().unwrap(), Chunk::html("<a>"));
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "failed to render <Broken>: boom");
        assert!(stream.next().await.is_none());
    }

    // ========================================================================
    // Islands
    // ========================================================================

    #[tokio::test]
    async fn test_island_render() {
        let factory = page(|| {
            TemplateResult::new().component(counter(
                Props::new()
                    .with("label", "Add")
                    .with("client:load", true)
                    .with("client:component-path", "/src/Counter.test")
                    .with("client:component-export", "default"),
            ))
        });
        let html = render(island_context(), factory).await;
        assert!(html.starts_with(
            "<style>astro-island,astro-slot,astro-static-slot{display:contents}</style><script>LOAD;ISLAND</script><astro-island uid=\""
        ));
        assert!(html.contains(
            r#" component-url="/src/Counter.test" component-export="default" renderer-url="/client.js" props="{&quot;label&quot;:[0,&quot;Add&quot;]}" ssr="" client="load""#
        ));
        assert!(html.ends_with(r#" await-children=""><button>Add</button></astro-island>"#));
    }

    #[tokio::test]
    async fn test_static_framework_component_has_no_island() {
        let factory = page(|| TemplateResult::new().component(counter(Props::new().with("label", "x"))));
        assert_eq!(render(island_context(), factory).await, "<button>x</button>");
    }

    #[tokio::test]
    async fn test_unplaced_slot_becomes_template() {
        let factory = page(|| {
            TemplateResult::new().component(
                counter(Props::new().with("client:load", true)).with_slots(
                    Slots::new()
                        .with("default", || TemplateResult::new().html("<i>d</i>"))
                        .with("footer", || TemplateResult::new().html("<i>f</i>")),
                ),
            )
        });
        let html = render(island_context(), factory).await;
        assert!(html.contains(
            r#"><button><astro-slot><i>d</i></astro-slot></button><template data-astro-template="footer"><i>f</i></template></astro-island>"#
        ));
    }

    #[tokio::test]
    async fn test_client_only_renders_fallback() {
        let factory = page(|| {
            TemplateResult::new().component(
                ComponentInvocation::new(
                    "Map",
                    Component::Framework(FrameworkComponent::new("/src/Map.jsx")),
                )
                .with_props(Props::new().with("client:only", "test"))
                .with_slots(Slots::new().with("fallback", || TemplateResult::new().html("<p>…</p>"))),
            )
        });
        let mut options = RenderOptions::default();
        options.client_scripts.directives.insert("only".into(), "ONLY".into());
        let ctx = Arc::new(RenderContext::new(options).with_renderer(Arc::new(TestRenderer)));
        let html = render(ctx, factory).await;
        assert!(html.contains(r#"client="only""#));
        assert!(html.contains(r#"opts="{&quot;name&quot;:&quot;Map&quot;,&quot;value&quot;:&quot;test&quot;}""#));
        assert!(html.contains("<p>…</p>"));
        assert!(!html.contains("<button>"));
    }

    #[tokio::test]
    async fn test_no_matching_renderer() {
        let factory = page(|| {
            TemplateResult::new().component(ComponentInvocation::new(
                "Widget",
                Component::Framework(FrameworkComponent::new("/src/Widget.vue")),
            ))
        });
        let err = render_to_string(island_context(), factory, Props::new(), Slots::new())
            .await
            .unwrap_err();
        match err {
            RenderError::NoMatchingRenderer { name, extension } => {
                assert_eq!(name, "Widget");
                assert_eq!(extension.as_deref(), Some("vue"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_only_without_hint() {
        let factory = page(|| {
            TemplateResult::new().component(
                ComponentInvocation::new(
                    "Map",
                    Component::Framework(FrameworkComponent::new("/src/Map.jsx")),
                )
                .with_props(Props::new().with("client:only", true)),
            )
        });
        let err = render_to_string(context(), factory, Props::new(), Slots::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::NoClientOnlyHint { .. }));
    }

    #[tokio::test]
    async fn test_nested_island_prescripts_hoisted() {
        let factory = page(|| {
            TemplateResult::new().component(
                counter(Props::new().with("label", "outer").with("client:load", true)).with_slots(
                    Slots::new().with("default", || {
                        TemplateResult::new().component(counter(
                            Props::new().with("label", "inner").with("client:load", true),
                        ))
                    }),
                ),
            )
        });
        let html = render(island_context(), factory).await;
        // The runtime is printed once, before the outer island.
        assert_eq!(html.matches("ISLAND").count(), 1);
        assert!(html.find("<script>").unwrap() < html.find("<astro-island").unwrap());
        assert_eq!(html.matches("<astro-island ").count(), 2);
    }

    #[tokio::test]
    async fn test_csp_header_after_render() {
        let mut options = RenderOptions {
            csp: Some(CspOptions::default()),
            ..RenderOptions::default()
        };
        options.client_scripts.island = "ISLAND".into();
        let ctx = Arc::new(RenderContext::new(options).with_renderer(Arc::new(TestRenderer)));
        let factory = page(|| TemplateResult::new().component(counter(Props::new().with("client:load", true))));
        let PageOutcome::Stream(stream) =
            render_page(ctx, factory, Props::new(), Slots::new()).await.unwrap()
        else {
            panic!("expected a stream");
        };
        let result = Arc::clone(stream.result());
        stream.into_string().await.unwrap();
        let header = result.content_security_policy().unwrap();
        assert!(header.starts_with("script-src 'self' 'sha256-"));
        assert!(header.contains("; style-src 'self' 'sha256-"));
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_drop_aborts_render() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dropped);
        let factory = page(move || {
            let guard = SetOnDrop(Arc::clone(&flag));
            TemplateResult::new().html("<a>").suspend(async move {
                let _guard = guard;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(TemplatePart::Html("<b>".into()))
            })
        });
        let PageOutcome::Stream(mut stream) =
            render_page(context(), factory, Props::new(), Slots::new()).await.unwrap()
        else {
            panic!("expected a stream");
        };
        assert_eq!(stream.next().await.unwrap().unwrap(), Chunk::html("<a>"));
        drop(stream);
        for _ in 0..10 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(dropped.load(Ordering::SeqCst));
    }
}
