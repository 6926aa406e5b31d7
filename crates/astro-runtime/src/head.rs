//! Head content collected during a render.

use crate::escape::{render_element, SsrElement};
use crate::result::SsrResult;

/// Print styles, links, scripts and extra head markup, in that order, and
/// mark the head as rendered. Identical elements are printed once.
pub fn render_all_head_content(result: &SsrResult) -> String {
    let mut state = result.state();
    state.has_rendered_head = true;

    let styles = dedupe(&state.styles);
    let links = dedupe(&state.links);
    let scripts = dedupe(&state.scripts);

    let mut parts: Vec<String> = Vec::new();
    for style in &styles {
        if style.get("rel") == Some("stylesheet") {
            parts.push(render_element("link", style, true));
        } else {
            if !style.children.is_empty() {
                result.hash_style(&mut state, &style.children);
            }
            parts.push(render_element("style", style, true));
        }
    }
    // Styles are consumed; a forced second head render does not repeat them.
    state.styles.clear();

    for link in &links {
        parts.push(render_element("link", link, false));
    }
    for script in &scripts {
        if script.get("src").is_none() && !script.children.is_empty() {
            result.hash_script(&mut state, &script.children);
        }
        parts.push(render_element("script", script, false));
    }

    let mut out = parts.join("\n");
    for extra in &state.extra_head {
        out.push_str(extra);
    }
    log::trace!(
        "rendered head: {} styles, {} links, {} scripts",
        styles.len(),
        links.len(),
        scripts.len()
    );
    out
}

/// Print head content only if nothing printed it yet.
pub fn maybe_render_head(result: &SsrResult) -> String {
    if result.has_rendered_head() {
        return String::new();
    }
    render_all_head_content(result)
}

fn dedupe(elements: &[SsrElement]) -> Vec<SsrElement> {
    let mut unique: Vec<SsrElement> = Vec::with_capacity(elements.len());
    for element in elements {
        if !unique.contains(element) {
            unique.push(element.clone());
        }
    }
    unique
}
