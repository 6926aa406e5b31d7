//! HTML content-model tables used by the parser.

/// Block-level tags that end an open `<p>`.
const P_CLOSERS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "div",
    "dl",
    "fieldset",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "ul",
];

/// Tags that, when opened, implicitly close an open `current` element.
/// `None` when `current` always needs an explicit close tag.
pub fn disallowed_contents(current: &str) -> Option<&'static [&'static str]> {
    let closers: &'static [&'static str] = match current {
        "li" => &["li"],
        "dt" | "dd" => &["dt", "dd"],
        "p" => P_CLOSERS,
        "rt" | "rp" => &["rt", "rp"],
        "optgroup" => &["optgroup"],
        "option" => &["option", "optgroup"],
        "thead" => &["tbody", "tfoot"],
        "tbody" => &["tbody", "tfoot"],
        "tfoot" => &["tbody"],
        "tr" => &["tr", "tbody"],
        "td" | "th" => &["td", "th", "tr"],
        _ => return None,
    };
    Some(closers)
}

/// Whether `current` may be closed without an end tag when `next` opens.
///
/// With `next == None` (end of parent or end of input) every element in the
/// table may be closed implicitly.
pub fn closing_tag_omitted(current: &str, next: Option<&str>) -> bool {
    match (disallowed_contents(current), next) {
        (Some(closers), Some(next)) => closers.contains(&next),
        (Some(_), None) => true,
        (None, _) => false,
    }
}
