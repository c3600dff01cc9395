//! Structural prober: proposes candidate record containers and pagination
//! controls from raw markup, before any oracle is consulted.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::markup::{css_path, descendants, element_text, resolve_url, tag_name};
use crate::models::compute_hash;

/// Class keywords that denote product semantics.
const PRODUCT_CLASS_KEYWORDS: [&str; 6] =
    ["product", "item", "card", "listing", "goods", "merchandise"];

/// Tags scanned for semantic product classes.
const SEMANTIC_CONTAINER_TAGS: [&str; 4] = ["div", "li", "article", "section"];

/// Tags scanned by the co-occurrence fallback.
const FALLBACK_CONTAINER_TAGS: [&str; 3] = ["div", "li", "article"];

/// Tags that may wrap a pagination control.
const PAGINATION_CONTAINER_TAGS: [&str; 4] = ["div", "nav", "ul", "ol"];

/// Substrings of an href, link text or link class hinting at pagination.
const PAGINATION_INDICATORS: [&str; 12] = [
    "page", "pag", "next", "weiter", "siguiente", "suivant", "arrow", "chevron", "»", ">", "›",
    "forward",
];

/// Link texts that denote "next page" outright.
const NEXT_TEXTS: [&str; 7] = ["next", "siguiente", "suivant", "weiter", "»", ">", "›"];

/// Link classes that denote "next page".
const NEXT_CLASSES: [&str; 4] = ["next", "arrow-right", "forward", "chevron-right"];

const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

static PAGE_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"page=(\d+)").expect("page query pattern"));

static STANDALONE_NEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)next|more|load more|show more|›|»|>").expect("standalone next pattern")
});

/// A candidate record container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerCandidate {
    pub path: String,
    pub tag: String,
    pub classes: Vec<String>,
    /// Number of descendant elements.
    pub child_count: usize,
    pub has_image: bool,
    pub has_price: bool,
    pub has_title: bool,
    pub has_link: bool,
}

/// An image seen on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
}

/// Page-level facts handed to the inference oracle alongside the candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub base_url: String,
    pub links: Vec<String>,
    pub images: Vec<ImageRef>,
    /// SHA-256 of the probed markup.
    pub content_hash: String,
}

/// Everything the prober learned about a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub page: PageMetadata,
    pub containers: Vec<ContainerCandidate>,
    pub pagination: Vec<String>,
}

/// Probe a page. Pure function of `html` and `base_url`.
pub fn probe(html: &str, base_url: &str) -> ProbeReport {
    let document = Html::parse_document(html);
    let elements: Vec<ElementRef<'_>> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();

    let containers = find_containers(&elements);
    let pagination = find_pagination(&elements);

    tracing::debug!(
        containers = containers.len(),
        pagination = pagination.len(),
        "Probed page structure"
    );

    ProbeReport {
        page: page_metadata(&elements, html, base_url),
        containers,
        pagination,
    }
}

fn page_metadata(elements: &[ElementRef<'_>], html: &str, base_url: &str) -> PageMetadata {
    let title = elements
        .iter()
        .find(|el| tag_name(el) == "title")
        .map(|el| element_text(*el))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title".to_string());

    let links = elements
        .iter()
        .filter(|el| tag_name(el) == "a")
        .filter_map(|el| el.value().attr("href"))
        .map(|href| resolve_url(base_url, href))
        .collect();

    let images = elements
        .iter()
        .filter(|el| tag_name(el) == "img")
        .filter_map(|el| {
            el.value().attr("src").map(|src| ImageRef {
                src: resolve_url(base_url, src),
                alt: el.value().attr("alt").unwrap_or_default().to_string(),
            })
        })
        .collect();

    PageMetadata {
        title,
        base_url: base_url.to_string(),
        links,
        images,
        content_hash: compute_hash(html),
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

fn find_containers(elements: &[ElementRef<'_>]) -> Vec<ContainerCandidate> {
    let semantic: Vec<ElementRef<'_>> = elements
        .iter()
        .copied()
        .filter(|el| SEMANTIC_CONTAINER_TAGS.contains(&tag_name(el)))
        .filter(|el| {
            class_string(*el).is_some_and(|classes| {
                PRODUCT_CLASS_KEYWORDS.iter().any(|kw| classes.contains(kw))
            })
        })
        .collect();

    let chosen = if semantic.is_empty() {
        tracing::debug!("No semantic product classes, using co-occurrence fallback");
        elements
            .iter()
            .copied()
            .filter(|el| FALLBACK_CONTAINER_TAGS.contains(&tag_name(el)))
            .filter(|el| class_string(*el).is_some())
            .filter(|el| {
                let image = has_descendant(*el, &["img"]);
                let price = has_price_text(*el);
                let title = has_descendant(*el, &HEADINGS);
                let link = has_descendant(*el, &["a"]);
                (image && price) || (image && title) || (title && price) || (link && image)
            })
            .collect()
    } else {
        semantic
    };

    chosen.into_iter().map(describe).collect()
}

fn describe(element: ElementRef<'_>) -> ContainerCandidate {
    ContainerCandidate {
        path: css_path(element),
        tag: tag_name(&element).to_string(),
        classes: element.value().classes().map(String::from).collect(),
        child_count: descendants(element).count(),
        has_image: has_descendant(element, &["img"]),
        has_price: has_price_text(element),
        has_title: has_descendant(element, &HEADINGS) || has_titled_class(element),
        has_link: has_descendant(element, &["a"]),
    }
}

/// Lowercased class attribute, if the element has one.
fn class_string(element: ElementRef<'_>) -> Option<String> {
    element.value().attr("class").map(str::to_lowercase)
}

fn has_descendant(element: ElementRef<'_>, tags: &[&str]) -> bool {
    descendants(element).any(|el| tags.contains(&tag_name(&el)))
}

fn has_titled_class(element: ElementRef<'_>) -> bool {
    descendants(element).any(|el| {
        class_string(el).is_some_and(|c| c.contains("title") || c.contains("name"))
    })
}

fn has_price_text(element: ElementRef<'_>) -> bool {
    element.text().any(|t| {
        t.contains('$')
            || t.contains('€')
            || t.contains('£')
            || t.to_lowercase().contains("price")
    })
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

fn find_pagination(elements: &[ElementRef<'_>]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut push = |path: String| {
        if !paths.contains(&path) {
            paths.push(path);
        }
    };

    for candidate in elements
        .iter()
        .copied()
        .filter(|el| PAGINATION_CONTAINER_TAGS.contains(&tag_name(el)))
        .filter(|el| el.value().attr("class").is_some())
    {
        let links: Vec<ElementRef<'_>> = descendants(candidate)
            .filter(|el| tag_name(el) == "a")
            .collect();

        if !links.iter().any(|link| hints_pagination(*link, &links)) {
            continue;
        }

        match links.iter().find(|link| is_next_link(**link)) {
            Some(next) => push(css_path(*next)),
            None => push(css_path(candidate)),
        }
    }

    for link in elements.iter().copied().filter(|el| tag_name(el) == "a") {
        if STANDALONE_NEXT.is_match(&element_text(link)) {
            push(css_path(link));
        }
    }

    paths
}

fn hints_pagination(link: ElementRef<'_>, all_links: &[ElementRef<'_>]) -> bool {
    let href = link.value().attr("href").unwrap_or_default().to_lowercase();
    let text = element_text(link).to_lowercase();
    let classes = class_string(link).unwrap_or_default();

    let indicated = |s: &str| PAGINATION_INDICATORS.iter().any(|ind| s.contains(ind));
    if indicated(&href) || indicated(&text) || indicated(&classes) {
        return true;
    }

    // A run of numbered links.
    is_number(&text)
        && all_links.len() > 2
        && all_links
            .iter()
            .any(|other| *other != link && is_number(&element_text(*other)))
}

fn is_next_link(link: ElementRef<'_>) -> bool {
    let text = element_text(link).to_lowercase();
    let classes = class_string(link).unwrap_or_default();
    let href = link.value().attr("href").unwrap_or_default();

    NEXT_TEXTS.contains(&text.as_str())
        || NEXT_CLASSES.iter().any(|c| classes.contains(c))
        || PAGE_QUERY.is_match(href)
}

fn is_number(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><head><title>Shop</title></head><body>
          <div class="product-item">
            <h3>Alpha Widget</h3><a href="/p/1">view</a>
            <img src="/img/1.jpg" alt="alpha"><span class="price">$9.99</span>
          </div>
          <div class="product-item">
            <h3>Beta Widget</h3><a href="/p/2">view</a>
            <img src="/img/2.jpg"><span class="price">$19.99</span>
          </div>
          <ul class="pagination">
            <li><a href="/list/1">1</a></li>
            <li><a href="/list/2">2</a></li>
            <li><a class="next" href="/list/2">Next</a></li>
          </ul>
        </body></html>"#;

    #[test]
    fn semantic_classes_win() {
        let report = probe(LISTING, "https://shop.test/list");

        let paths: Vec<&str> = report.containers.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["div.product-item", "div.product-item"]);

        let first = &report.containers[0];
        assert_eq!(first.tag, "div");
        assert_eq!(first.classes, vec!["product-item".to_string()]);
        assert!(first.has_image && first.has_price && first.has_title && first.has_link);
        assert_eq!(first.child_count, 4);
    }

    #[test]
    fn page_metadata_is_resolved() {
        let report = probe(LISTING, "https://shop.test/list");
        assert_eq!(report.page.title, "Shop");
        assert!(report.page.links.contains(&"https://shop.test/p/1".to_string()));
        assert_eq!(report.page.images[0].src, "https://shop.test/img/1.jpg");
        assert_eq!(report.page.images[0].alt, "alpha");
        assert_eq!(report.page.content_hash.len(), 64);
    }

    #[test]
    fn co_occurrence_fallback_without_semantic_classes() {
        let html = r#"<body>
            <div class="tile"><img src="a.jpg"><h2>Lamp</h2></div>
            <div class="tile"><p>just text</p></div>
            <div class="promo"><a href="/x">go</a><img src="b.jpg"></div>
          </body>"#;
        let report = probe(html, "https://shop.test/");

        assert_eq!(report.containers.len(), 2);
        assert_eq!(report.containers[0].path, "div.tile");
        assert_eq!(report.containers[1].path, "div.promo");
    }

    #[test]
    fn explicit_next_link_preferred_over_container() {
        let report = probe(LISTING, "https://shop.test/list");
        assert_eq!(report.pagination, vec!["a.next".to_string()]);
    }

    #[test]
    fn container_path_used_when_no_next_link() {
        let html = r#"<body><nav class="pager">
            <a href="/list/1">1</a><a href="/list/2">2</a><a href="/list/3">3</a>
          </nav></body>"#;
        let report = probe(html, "https://shop.test/");
        assert_eq!(report.pagination, vec!["nav.pager".to_string()]);
    }

    #[test]
    fn standalone_next_links_are_deduplicated() {
        let html = r#"<body>
            <div class="pages"><a class="next" href="/list?page=2">Next</a></div>
            <p><a id="more" href="/list?offset=20">Load more</a></p>
          </body>"#;
        let report = probe(html, "https://shop.test/");
        assert_eq!(
            report.pagination,
            vec!["a.next".to_string(), "#more".to_string()]
        );
    }

    #[test]
    fn localized_and_glyph_next_links_are_found() {
        for label in ["Weiter", "Siguiente", "Suivant", "»", "›"] {
            let html = format!(
                r#"<body><div class="pager">
                    <a href="/l/1">1</a><a id="fwd" href="/l/2">{label}</a>
                  </div></body>"#
            );
            let report = probe(&html, "https://shop.test/");
            assert_eq!(report.pagination, vec!["#fwd".to_string()], "label {label}");
        }
    }

    #[test]
    fn probing_is_deterministic() {
        let a = probe(LISTING, "https://shop.test/list");
        let b = probe(LISTING, "https://shop.test/list");
        assert_eq!(a, b);
    }
}
