//! Hydration directives and `<astro-island>` markup.

use std::fmt::Write as _;

use crate::escape::{escape_html, render_element, to_attribute_string, SsrElement};
use crate::instruction::Island;
use crate::props::{PropValue, Props};
use crate::result::{RenderOptions, SsrResult};
use crate::shorthash::shorthash;
use crate::RenderError;

const ISLAND_STYLES: &str = "astro-island,astro-slot,astro-static-slot{display:contents}";

/// A `client:*` directive found on a framework component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationDirective {
    pub directive: String,
    pub value: Option<String>,
    /// From `client:component-path`, set by the compiler.
    pub component_url: Option<String>,
    /// From `client:component-export`, set by the compiler.
    pub component_export: Option<String>,
}

/// Props split into those passed to the component and the hydration request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedProps {
    pub props: Props,
    pub hydration: Option<HydrationDirective>,
}

/// Move `client:*` keys out of `input`, validating the directive against
/// the configured set.
pub fn extract_directives(
    display_name: &str,
    input: Props,
    options: &RenderOptions,
) -> Result<ExtractedProps, RenderError> {
    let mut extracted = ExtractedProps::default();
    for (key, value) in input {
        let Some(name) = key.strip_prefix("client:") else {
            extracted.props.insert(key, value);
            continue;
        };
        let hydration = extracted.hydration.get_or_insert_with(HydrationDirective::default);
        match name {
            "component-path" => hydration.component_url = value.as_str().map(String::from),
            "component-export" => hydration.component_export = value.as_str().map(String::from),
            "component-hydration" | "display-name" => {}
            directive => {
                if !options.client_directives.iter().any(|d| d == directive) {
                    let valid = options
                        .client_directives
                        .iter()
                        .map(|d| format!("client:{d}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(RenderError::InvalidDirective {
                        name: display_name.to_string(),
                        directive: directive.to_string(),
                        valid,
                    });
                }
                if directive == "media" && value.as_str().is_none() {
                    return Err(RenderError::MissingDirectiveValue {
                        name: display_name.to_string(),
                        directive: directive.to_string(),
                    });
                }
                hydration.directive = directive.to_string();
                hydration.value = match value {
                    PropValue::String(s) => Some(s),
                    _ => None,
                };
            }
        }
    }
    // Compiler-only keys without an actual directive do not hydrate.
    if extracted
        .hydration
        .as_ref()
        .is_some_and(|h| h.directive.is_empty())
    {
        extracted.hydration = None;
    }
    Ok(extracted)
}

/// Stable island id derived from what the island renders.
pub fn island_uid(component_export: &str, component_url: &str, html: &str, props: &str) -> String {
    shorthash(&format!(
        "<!--{component_export}:{component_url}-->\n{html}\n{props}"
    ))
}

/// Markup for slots the framework did not place, so the client can still
/// hand them to the component.
pub fn unrendered_slot_templates(html: &str, slots: &[(String, String)]) -> String {
    let mut out = String::new();
    for (name, children) in slots {
        let marker = if name == "default" {
            "<astro-slot>".to_string()
        } else {
            format!("<astro-slot name=\"{name}\">")
        };
        if html.contains(&marker) {
            continue;
        }
        if name == "default" {
            let _ = write!(out, "<template data-astro-template>{children}</template>");
        } else {
            let _ = write!(
                out,
                "<template data-astro-template=\"{}\">{children}</template>",
                to_attribute_string(name)
            );
        }
    }
    out
}

/// Print the `<astro-island>` element.
pub fn render_island(island: &Island) -> String {
    let metadata = &island.metadata;
    let mut element = SsrElement::new().prop("uid", to_attribute_string(&island.uid));
    for (key, value) in &island.attributes {
        element = element.prop(key.clone(), to_attribute_string(value));
    }
    element = element
        .prop("component-url", to_attribute_string(&metadata.component_url))
        .prop("component-export", to_attribute_string(&metadata.component_export));
    if let Some(url) = &island.renderer_url {
        element = element.prop("renderer-url", to_attribute_string(url));
    }
    let opts = serde_json::json!({
        "name": metadata.display_name,
        "value": metadata.value.as_deref().map_or(serde_json::Value::Bool(true), |v| v.into()),
    });
    element = element
        .prop("props", escape_html(&metadata.props))
        .prop("ssr", "")
        .prop("client", to_attribute_string(&metadata.directive))
        .prop("opts", escape_html(&opts.to_string()));
    if !island.children.is_empty() {
        element = element.prop("await-children", "");
    }
    element = element.children(island.children.clone());
    render_element("astro-island", &element, false)
}

/// Bootstrap markup printed before an island: island styles and runtime the
/// first time in a render, then each directive's loader once.
pub(crate) fn prescripts(result: &SsrResult, directive: &str) -> String {
    let scripts = &result.options().client_scripts;
    let directive_script = scripts
        .directives
        .get(directive)
        .map(String::as_str)
        .unwrap_or_default();

    let mut state = result.state();
    if !state.has_hydration_script {
        state.has_hydration_script = true;
        state.rendered_directives.insert(directive.to_string());
        let script = format!("{directive_script};{}", scripts.island);
        result.hash_style(&mut state, ISLAND_STYLES);
        result.hash_script(&mut state, &script);
        format!("<style>{ISLAND_STYLES}</style><script>{script}</script>")
    } else if state.rendered_directives.insert(directive.to_string()) {
        result.hash_script(&mut state, directive_script);
        format!("<script>{directive_script}</script>")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::HydrationMetadata;
    use pretty_assertions::assert_eq;

    // ========================================================================
    // extract_directives
    // ========================================================================

    #[test]
    fn test_extract_load() {
        let props = Props::new()
            .with("count", 1)
            .with("client:load", true)
            .with("client:component-path", "/src/Counter.jsx")
            .with("client:component-export", "default")
            .with("client:component-hydration", "load");
        let extracted = extract_directives("Counter", props, &RenderOptions::default()).unwrap();
        assert_eq!(extracted.props, Props::new().with("count", 1));
        assert_eq!(
            extracted.hydration,
            Some(HydrationDirective {
                directive: "load".into(),
                value: None,
                component_url: Some("/src/Counter.jsx".into()),
                component_export: Some("default".into()),
            })
        );
    }

    #[test]
    fn test_extract_without_directive() {
        let props = Props::new().with("title", "x");
        let extracted = extract_directives("Card", props.clone(), &RenderOptions::default()).unwrap();
        assert_eq!(extracted.props, props);
        assert_eq!(extracted.hydration, None);
    }

    #[test]
    fn test_extract_media_value() {
        let props = Props::new().with("client:media", "(max-width: 600px)");
        let extracted = extract_directives("Nav", props, &RenderOptions::default()).unwrap();
        let hydration = extracted.hydration.unwrap();
        assert_eq!(hydration.directive, "media");
        assert_eq!(hydration.value.as_deref(), Some("(max-width: 600px)"));
    }

    #[test]
    fn test_media_requires_value() {
        let props = Props::new().with("client:media", true);
        let err = extract_directives("Nav", props, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::MissingDirectiveValue { .. }));
    }

    #[test]
    fn test_invalid_directive() {
        let props = Props::new().with("client:hover", true);
        let err = extract_directives("Nav", props, &RenderOptions::default()).unwrap_err();
        match err {
            RenderError::InvalidDirective { name, directive, valid } => {
                assert_eq!(name, "Nav");
                assert_eq!(directive, "hover");
                assert!(valid.starts_with("client:load, client:idle"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    // ========================================================================
    // Island markup
    // ========================================================================

    #[test]
    fn test_island_uid_is_stable() {
        let a = island_uid("default", "/C.jsx", "<p>1</p>", "{}");
        assert_eq!(a, island_uid("default", "/C.jsx", "<p>1</p>", "{}"));
        assert_ne!(a, island_uid("default", "/C.jsx", "<p>2</p>", "{}"));
    }

    #[test]
    fn test_render_island() {
        let island = Island {
            uid: "abc".into(),
            metadata: HydrationMetadata {
                directive: "load".into(),
                value: None,
                component_export: "default".into(),
                component_url: "/C.jsx".into(),
                display_name: "C".into(),
                props: r#"{"n":[0,1]}"#.into(),
            },
            renderer_url: Some("/r.js".into()),
            attributes: vec![],
            children: "<b>1</b>".into(),
        };
        assert_eq!(
            render_island(&island),
            concat!(
                r#"<astro-island uid="abc" component-url="/C.jsx" component-export="default" "#,
                r#"renderer-url="/r.js" props="{&quot;n&quot;:[0,1]}" ssr="" client="load" "#,
                r#"opts="{&quot;name&quot;:&quot;C&quot;,&quot;value&quot;:true}" await-children="">"#,
                "<b>1</b></astro-island>"
            )
        );
    }

    #[test]
    fn test_render_island_media_opts() {
        let island = Island {
            metadata: HydrationMetadata {
                directive: "media".into(),
                value: Some("(x)".into()),
                display_name: "N".into(),
                ..HydrationMetadata::default()
            },
            ..Island::default()
        };
        let html = render_island(&island);
        assert!(html.contains(r#"opts="{&quot;name&quot;:&quot;N&quot;,&quot;value&quot;:&quot;(x)&quot;}""#));
        assert!(!html.contains("await-children"));
    }

    #[test]
    fn test_unrendered_slot_templates() {
        let slots = vec![
            ("default".to_string(), "<p>a</p>".to_string()),
            ("footer".to_string(), "<p>b</p>".to_string()),
        ];
        assert_eq!(
            unrendered_slot_templates("<div><astro-slot></astro-slot></div>", &slots),
            r#"<template data-astro-template="footer"><p>b</p></template>"#
        );
        assert_eq!(
            unrendered_slot_templates("", &slots[..1]),
            "<template data-astro-template><p>a</p></template>"
        );
    }

    #[test]
    fn test_prescripts_recorded_in_csp_header() {
        use crate::csp::{CspAlgorithm, CspOptions};
        use crate::result::RenderContext;
        use std::sync::Arc;

        let mut options = RenderOptions {
            csp: Some(CspOptions::default()),
            ..RenderOptions::default()
        };
        options.client_scripts.island = "ISLAND".into();
        options.client_scripts.directives.insert("load".into(), "LOAD".into());
        options.client_scripts.directives.insert("idle".into(), "IDLE".into());
        let result = SsrResult::new(Arc::new(RenderContext::new(options)));

        prescripts(&result, "load");
        prescripts(&result, "idle");
        prescripts(&result, "load");

        let header = result.content_security_policy().unwrap();
        assert_eq!(
            header,
            format!(
                "script-src 'self' '{}' '{}'; style-src 'self' '{}'",
                CspAlgorithm::Sha256.hash("LOAD;ISLAND"),
                CspAlgorithm::Sha256.hash("IDLE"),
                CspAlgorithm::Sha256.hash(ISLAND_STYLES),
            )
        );
    }
}
