//! Head propagation.
//!
//! Components that contribute `<head>` content from deep in the tree are
//! instantiated before the page streams, so their head markup is known by
//! the time the head is printed.

use std::sync::Arc;

use super::engine::render_to_html;
use super::factory::{ComponentFactory, FactoryReturnValue, PropagationHint};
use super::template::{Component, TemplatePart, TemplateResult};
use crate::result::{ComponentMetadata, SsrResult};
use crate::{BoxFuture, RenderError};

/// The factory's own hint, else the metadata entry for its module, else
/// [`PropagationHint::None`].
pub fn get_propagation_hint(
    metadata: &ComponentMetadata,
    factory: &dyn ComponentFactory,
) -> PropagationHint {
    factory
        .propagation()
        .or_else(|| factory.module_id().and_then(|id| metadata.get(id).copied()))
        .unwrap_or_default()
}

pub fn is_a_propagating_component(
    metadata: &ComponentMetadata,
    factory: &dyn ComponentFactory,
) -> bool {
    get_propagation_hint(metadata, factory) != PropagationHint::None
}

/// Walk `template` in document order, calling every propagating component
/// once and moving its head content into the render's extra head. The
/// factory output is stored on the invocation and reused when the body
/// renders.
pub(crate) fn buffer_head_content<'a>(
    result: &'a Arc<SsrResult>,
    template: &'a mut TemplateResult,
) -> BoxFuture<'a, Result<(), RenderError>> {
    Box::pin(async move {
        for part in template.parts_mut() {
            match part {
                TemplatePart::Template(inner) => buffer_head_content(result, inner).await?,
                TemplatePart::Component(invocation) => {
                    let Component::Astro(factory) = &invocation.component else {
                        continue;
                    };
                    if invocation.prepared.is_some()
                        || !is_a_propagating_component(&result.context().metadata, factory.as_ref())
                    {
                        continue;
                    }
                    let factory = Arc::clone(factory);
                    log::trace!("buffering head content of <{}>", invocation.display_name);
                    let value = factory
                        .call(
                            Arc::clone(result),
                            std::mem::take(&mut invocation.props),
                            invocation.slots.clone(),
                        )
                        .await?;
                    let value = match value {
                        FactoryReturnValue::HeadAndContent { head, mut content } => {
                            let head = render_to_html(result, head).await?;
                            result.add_extra_head(head);
                            buffer_head_content(result, &mut content).await?;
                            FactoryReturnValue::Template(content)
                        }
                        FactoryReturnValue::Template(mut content) => {
                            buffer_head_content(result, &mut content).await?;
                            FactoryReturnValue::Template(content)
                        }
                        other => other,
                    };
                    invocation.prepared = Some(value);
                }
                _ => {}
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::AstroComponent;
    use pretty_assertions::assert_eq;

    fn component() -> AstroComponent {
        AstroComponent::new("Post", |_, _, _| async { Ok(FactoryReturnValue::ThinHead) })
    }

    #[test]
    fn test_hint_defaults_to_none() {
        let metadata = ComponentMetadata::default();
        assert_eq!(get_propagation_hint(&metadata, &component()), PropagationHint::None);
        assert!(!is_a_propagating_component(&metadata, &component()));
    }

    #[test]
    fn test_hint_from_metadata() {
        let mut metadata = ComponentMetadata::default();
        metadata.insert("/src/Post.astro".into(), PropagationHint::InTree);
        let post = component().with_module_id("/src/Post.astro");
        assert_eq!(get_propagation_hint(&metadata, &post), PropagationHint::InTree);
        assert!(is_a_propagating_component(&metadata, &post));
    }

    #[test]
    fn test_factory_hint_wins() {
        let mut metadata = ComponentMetadata::default();
        metadata.insert("/src/Post.astro".into(), PropagationHint::InTree);
        let post = component()
            .with_module_id("/src/Post.astro")
            .with_propagation(PropagationHint::SelfHint);
        assert_eq!(get_propagation_hint(&metadata, &post), PropagationHint::SelfHint);
    }
}
