//! Small helpers over the `scraper` DOM shared by the prober, the sample
//! extractor and the program interpreter.

use scraper::{ElementRef, Selector};
use url::Url;

/// Image source attributes, in priority order. The `*srcset` entries hold
/// several candidates; only the first URL token is used.
pub const IMAGE_SOURCE_ATTRS: [&str; 6] = [
    "src",
    "data-src",
    "data-original",
    "data-lazy-src",
    "data-srcset",
    "srcset",
];

/// Compile a rule into a selector. Unparseable rules match nothing.
pub fn parse_selector(rule: &str) -> Option<Selector> {
    match Selector::parse(rule) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::warn!(%rule, error = ?e, "Rule is not a valid selector");
            None
        }
    }
}

/// Concatenated, trimmed text content of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// The lowercase tag name of an element.
pub fn tag_name<'a>(element: &ElementRef<'a>) -> &'a str {
    element.value().name()
}

/// Element descendants of `element`, excluding itself, in document order.
pub fn descendants<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.descendants().skip(1).filter_map(ElementRef::wrap)
}

/// First usable image source of an element, unresolved.
///
/// Inline `data:` URIs are skipped.
pub fn image_source(element: ElementRef<'_>) -> Option<String> {
    for attr in IMAGE_SOURCE_ATTRS {
        let Some(raw) = element.value().attr(attr) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            continue;
        }
        let candidate = if attr.ends_with("srcset") {
            first_url_token(raw)
        } else {
            Some(raw)
        };
        if let Some(src) = candidate {
            return Some(src.to_string());
        }
    }
    None
}

/// First URL of a multi-value attribute such as `srcset`.
pub fn first_url_token(value: &str) -> Option<&str> {
    value
        .split(',')
        .next()
        .and_then(|candidate| candidate.split_whitespace().next())
}

/// Resolve `href` against `base`. Falls back to the raw `href` when the
/// base itself is not a URL.
pub fn resolve_url(base: &str, href: &str) -> String {
    let href = href.trim();
    match Url::parse(base) {
        Ok(base) => base
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string()),
        Err(_) => href.to_string(),
    }
}

/// `javascript:` pseudo-links and bare fragments lead nowhere.
pub fn is_dead_link(href: &str) -> bool {
    let href = href.trim();
    href.is_empty() || href.starts_with('#') || href.to_lowercase().starts_with("javascript:")
}

/// Deterministic structural path of an element.
///
/// Prefers `tag.class1.class2`, then `#id`, then `tag:nth-of-type(k)` when
/// the parent has several children with the same tag, then the bare tag.
pub fn css_path(element: ElementRef<'_>) -> String {
    let tag = tag_name(&element);

    let classes: Vec<&str> = element.value().classes().collect();
    if !classes.is_empty() {
        return format!("{tag}.{}", classes.join("."));
    }

    if let Some(id) = element.value().id().filter(|id| !id.is_empty()) {
        return format!("#{id}");
    }

    if let Some(parent) = element.parent() {
        let siblings: Vec<ElementRef<'_>> = parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| tag_name(sibling) == tag)
            .collect();
        if siblings.len() > 1 {
            if let Some(index) = siblings.iter().position(|s| *s == element) {
                return format!("{tag}:nth-of-type({})", index + 1);
            }
        }
    }

    tag.to_string()
}
