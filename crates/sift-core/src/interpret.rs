//! Extraction-program interpreter: runs a compiled [`ExtractionProgram`]
//! against pages, walking pagination under the program's bounds.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::markup::{
    descendants, element_text, image_source, is_dead_link, parse_selector, resolve_url, tag_name,
};
use crate::models::{Field, Record};
use crate::program::{CascadeStep, ExtractionProgram, PaginationStrategy};
use crate::traits::Fetcher;

/// Containers mentioning any of these and holding many links are skipped.
const NAV_INDICATORS: [&str; 6] = ["nav", "navigation", "menu", "footer", "header", "breadcrumb"];

/// Link count above which a nav-looking container is skipped.
const NAV_LINK_LIMIT: usize = 3;

/// Path fragments of links that never lead to a product.
const URL_DENYLIST: [&str; 4] = ["login", "cart", "account", "search"];

/// Image source fragments that mark decoration rather than product photos.
const IMAGE_DENYLIST: [&str; 6] = ["icon", "logo", "banner", "button", "pixel.gif", "spacer.gif"];

/// Images whose declared width and height are both below this are ignored.
const MIN_IMAGE_DIMENSION: u32 = 50;

const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 200;

const PRICE_MARKERS: [&str; 6] = ["$", "€", "£", "USD", "EUR", "GBP"];

static DECIMAL_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d{2}").expect("decimal amount pattern"));

/// A `/<segment>/<number>` pair inside a URL path.
static PATH_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([^/]+)/(\d+)").expect("path page pattern"));

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The page ceiling was reached.
    PageLimit,
    /// No pagination strategy produced a next URL.
    NoNextPage,
    /// A page had no record containers.
    NoRecords,
    /// A page could not be fetched. Records from earlier pages are kept.
    FetchFailed { url: String, message: String },
    /// The program has no container rule.
    NoContainer,
}

/// Result of running a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub records: Vec<Record>,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
}

/// What one page yielded.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub records: Vec<Record>,
    /// Containers matched, including skipped navigation blocks.
    pub containers_seen: usize,
    pub skipped_nav: usize,
    pub next_url: Option<String>,
}

/// A cascade step with its selector compiled.
enum CompiledStep {
    Rule(Selector),
    ContentScan(Vec<String>),
}

fn compile_steps(steps: &[CascadeStep]) -> Vec<CompiledStep> {
    steps
        .iter()
        .filter_map(|step| match step {
            CascadeStep::Rule { rule } => parse_selector(rule).map(CompiledStep::Rule),
            CascadeStep::ContentScan { symbols } => {
                Some(CompiledStep::ContentScan(symbols.clone()))
            }
        })
        .collect()
}

impl ExtractionProgram {
    /// Extract records and the next page URL from one page. Pure.
    pub fn extract_page(&self, html: &str, page_url: &str) -> PageExtraction {
        let Some(container_selector) = self.container.as_deref().and_then(parse_selector) else {
            return PageExtraction::default();
        };

        let document = Html::parse_document(html);
        let cascades: Vec<(Field, Vec<CompiledStep>)> = Field::REFINED
            .iter()
            .map(|field| (*field, compile_steps(self.fields.for_field(*field))))
            .collect();

        let mut page = PageExtraction::default();
        for container in document.select(&container_selector) {
            page.containers_seen += 1;
            if looks_like_navigation(container) {
                page.skipped_nav += 1;
                continue;
            }

            let mut record = Record::default();
            for (field, steps) in &cascades {
                let matched = steps.iter().enumerate().find_map(|(index, step)| {
                    run_step(container, *field, step, page_url).map(|value| (index, value))
                });
                if let Some((index, value)) = matched {
                    tracing::debug!(
                        record = page.records.len(),
                        %field,
                        step = index,
                        "Field matched"
                    );
                    match field {
                        Field::Title => record.title = value,
                        Field::Url => record.url = value,
                        Field::Image => record.image_url = value,
                        Field::Price => record.price = value,
                        Field::Container | Field::NextPage => {}
                    }
                }
            }
            page.records.push(record);
        }

        if page.skipped_nav > 0 {
            tracing::debug!(skipped = page.skipped_nav, "Skipped navigation containers");
        }
        page.next_url = self.next_page_url(&document, page_url);
        page
    }

    /// Apply the pagination cascade; the first applicable strategy wins.
    fn next_page_url(&self, document: &Html, page_url: &str) -> Option<String> {
        for strategy in &self.pagination {
            let next = match strategy {
                PaginationStrategy::NextLink { rule } => next_link(document, rule, page_url),
                PaginationStrategy::QueryParam { name, first_value } => {
                    next_query_page(page_url, name, *first_value)
                }
                PaginationStrategy::PathSegment { segment } => next_path_page(page_url, segment),
            };
            if let Some(url) = next {
                tracing::debug!(?strategy, %url, "Resolved next page");
                return Some(url);
            }
        }
        None
    }

    /// Run the program from `start_url`, fetching at most
    /// `min(max_pages, bounds.max_pages)` pages.
    ///
    /// Per-page failures end the walk but never discard collected records.
    pub async fn run<F: Fetcher>(
        &self,
        fetcher: &F,
        start_url: &str,
        max_pages: usize,
    ) -> RunOutcome {
        let limit = max_pages.min(self.bounds.max_pages);
        let mut records = Vec::new();
        let mut pages_fetched = 0;

        if self.container.is_none() {
            return RunOutcome {
                records,
                pages_fetched,
                stop_reason: StopReason::NoContainer,
            };
        }
        if limit == 0 {
            return RunOutcome {
                records,
                pages_fetched,
                stop_reason: StopReason::PageLimit,
            };
        }

        let mut current = start_url.to_string();
        let stop_reason = loop {
            tracing::info!(page = pages_fetched + 1, url = %current, "Scraping page");
            let html = match fetcher.fetch(&current).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(url = %current, error = %e, "Page fetch failed, stopping");
                    break StopReason::FetchFailed {
                        url: current,
                        message: e.to_string(),
                    };
                }
            };
            pages_fetched += 1;

            let page = self.extract_page(&html, &current);
            if page.containers_seen == 0 {
                tracing::info!(url = %current, "No products found on this page");
                break StopReason::NoRecords;
            }
            tracing::info!(count = page.records.len(), "Extracted records");
            records.extend(page.records);

            if pages_fetched >= limit {
                break StopReason::PageLimit;
            }
            let Some(next) = page.next_url else {
                break StopReason::NoNextPage;
            };

            let pause = self.bounds.delay.sample();
            tracing::debug!(delay_ms = pause.as_millis() as u64, "Waiting before next page");
            tokio::time::sleep(pause).await;
            current = next;
        };

        RunOutcome {
            records,
            pages_fetched,
            stop_reason,
        }
    }
}

fn run_step(
    container: ElementRef<'_>,
    field: Field,
    step: &CompiledStep,
    page_url: &str,
) -> Option<String> {
    match step {
        CompiledStep::Rule(selector) => container
            .select(selector)
            .find_map(|el| accept(field, el, page_url)),
        CompiledStep::ContentScan(symbols) => content_scan(container, symbols),
    }
}

/// The field-specific acceptance filter. Returns the value to store.
fn accept(field: Field, element: ElementRef<'_>, page_url: &str) -> Option<String> {
    match field {
        Field::Title => {
            let text = element_text(element);
            let len = text.chars().count();
            (TITLE_MIN_CHARS..=TITLE_MAX_CHARS)
                .contains(&len)
                .then_some(text)
        }
        Field::Url => {
            let href = element.value().attr("href")?;
            if is_dead_link(href) {
                return None;
            }
            let lowered = href.to_lowercase();
            if URL_DENYLIST.iter().any(|word| lowered.contains(word)) {
                return None;
            }
            Some(resolve_url(page_url, href))
        }
        Field::Image => {
            let image = if tag_name(&element) == "img" {
                element
            } else {
                let img = parse_selector("img")?;
                element.select(&img).next()?
            };
            if is_tiny(image) {
                return None;
            }
            let src = image_source(image)?;
            let lowered = src.to_lowercase();
            if IMAGE_DENYLIST.iter().any(|word| lowered.contains(word)) {
                return None;
            }
            Some(resolve_url(page_url, &src))
        }
        Field::Price => {
            let text = element_text(element);
            looks_like_price(&text).then_some(text)
        }
        Field::Container | Field::NextPage => None,
    }
}

fn is_tiny(image: ElementRef<'_>) -> bool {
    let dimension = |name: &str| {
        image
            .value()
            .attr(name)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<u32>().ok())
    };
    matches!(
        (dimension("width"), dimension("height")),
        (Some(w), Some(h)) if w < MIN_IMAGE_DIMENSION && h < MIN_IMAGE_DIMENSION
    )
}

fn looks_like_price(text: &str) -> bool {
    !text.is_empty()
        && (PRICE_MARKERS.iter().any(|m| text.contains(m)) || DECIMAL_AMOUNT.is_match(text))
}

/// Innermost element of `container` whose own text mentions a symbol.
fn content_scan(container: ElementRef<'_>, symbols: &[String]) -> Option<String> {
    let mentions = |el: &ElementRef<'_>| {
        let text = element_text(*el);
        symbols.iter().any(|s| text.contains(s.as_str()))
    };
    descendants(container)
        .filter(|el| mentions(el))
        .find(|el| !el.children().filter_map(ElementRef::wrap).any(|c| mentions(&c)))
        .map(element_text)
}

fn looks_like_navigation(container: ElementRef<'_>) -> bool {
    let markup = container.html().to_lowercase();
    if !NAV_INDICATORS.iter().any(|word| markup.contains(word)) {
        return false;
    }
    let links = descendants(container)
        .filter(|el| tag_name(el) == "a")
        .count();
    links > NAV_LINK_LIMIT
}

fn next_link(document: &Html, rule: &str, page_url: &str) -> Option<String> {
    let selector = parse_selector(rule)?;
    let link = document.select(&selector).next()?;
    let href = link.value().attr("href")?;
    if is_dead_link(href) {
        tracing::debug!(%href, "Next link leads nowhere, trying other strategies");
        return None;
    }
    Some(resolve_url(page_url, href))
}

/// Increment `name` in the query string, or append it with `first_value`.
/// Not applicable when the current value is not a number.
fn next_query_page(page_url: &str, name: &str, first_value: u32) -> Option<String> {
    let mut url = Url::parse(page_url).ok()?;
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    match pairs.iter_mut().find(|(key, _)| key == name) {
        Some((_, value)) => {
            let current: u64 = value.parse().ok()?;
            *value = current.checked_add(1)?.to_string();
        }
        None => pairs.push((name.to_string(), first_value.to_string())),
    }

    url.query_pairs_mut().clear().extend_pairs(&pairs);
    Some(url.to_string())
}

/// Increment the number following `/<segment>/` in the path.
/// Not applicable when the path carries no such segment or the number is at its limit.
fn next_path_page(page_url: &str, segment: &str) -> Option<String> {
    let mut url = Url::parse(page_url).ok()?;
    let path = url.path().to_string();
    let number = PATH_PAGE
        .captures_iter(&path)
        .find(|caps| caps.get(1).is_some_and(|name| name.as_str() == segment))?
        .get(2)?;
    let next = number.as_str().parse::<u64>().ok()?.checked_add(1)?;
    url.set_path(&format!(
        "{}{next}{}",
        &path[..number.start()],
        &path[number.end()..]
    ));
    Some(url.to_string())
}

/// Serialize records as CSV with a `title,url,image_url,price` header.
pub fn records_to_csv(records: &[Record]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["title", "url", "image_url", "price"])?;
    for record in records {
        writer.write_record([&record.title, &record.url, &record.image_url, &record.price])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::CsvError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::CsvError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::PageDelay;
    use crate::models::{NOT_AVAILABLE, RuleSet};
    use crate::program::PaginationIntent;
    use crate::testutil::{LISTING_HTML, MockFetcher, listing_rules};

    const BASE: &str = "https://shop.test/catalog";

    fn program(rules: &RuleSet, intent: PaginationIntent) -> ExtractionProgram {
        ExtractionProgram::compile(rules, &intent, PageDelay::none())
    }

    #[test]
    fn extracts_listing_in_document_order() {
        let program = program(&listing_rules(), PaginationIntent::disabled());
        let page = program.extract_page(LISTING_HTML, BASE);

        assert_eq!(page.records.len(), 3);
        let prices: Vec<&str> = page.records.iter().map(|r| r.price.as_str()).collect();
        assert_eq!(prices, vec!["$9.99", "$19.99", "$29.99"]);
        assert_eq!(page.records[0].title, "Classic Leather Wallet");
        assert_eq!(page.records[0].url, "https://shop.test/products/1");
        assert_eq!(page.records[0].image_url, "https://shop.test/img/1.jpg");
        assert!(page.next_url.is_none());
    }

    #[test]
    fn falls_back_when_resolved_rule_misses() {
        let html = r#"
            <div class="card">
              <h4>Desk Lamp Deluxe</h4>
              <a href="/cart">Add to cart</a>
              <a href="/p/lamp">Details</a>
              <img src="/icons/star.png"><img src="/photos/lamp.jpg">
              <div class="price">€ 45,00</div>
            </div>"#;
        let rules = RuleSet::new("div.card")
            .with_rule(Field::Title, ".missing")
            .with_rule(Field::Url, "a")
            .with_rule(Field::Image, "img")
            .with_rule(Field::Price, "span.nope");
        let page = program(&rules, PaginationIntent::disabled()).extract_page(html, BASE);
        let record = &page.records[0];

        assert_eq!(record.title, "Desk Lamp Deluxe");
        assert_eq!(record.url, "https://shop.test/p/lamp");
        assert_eq!(record.image_url, "https://shop.test/photos/lamp.jpg");
        assert_eq!(record.price, "€ 45,00");
    }

    #[test]
    fn content_scan_takes_innermost_currency_element() {
        let html = r#"<div class="card"><h3>Espresso Cup</h3>
                      <div><p>Only <b>£4</b> today</p></div></div>"#;
        let rules = RuleSet::new("div.card").with_rule(Field::Price, "span.none");
        let page = program(&rules, PaginationIntent::disabled()).extract_page(html, BASE);
        assert_eq!(page.records[0].price, "£4");
    }

    #[test]
    fn unmatched_fields_default_to_not_available() {
        let html = r#"<div class="card"><span>??</span></div>"#;
        let program = program(&RuleSet::new("div.card"), PaginationIntent::disabled());
        let page = program.extract_page(html, BASE);
        assert_eq!(page.records[0], Record::default());
        assert_eq!(page.records[0].title, NOT_AVAILABLE);
    }

    #[test]
    fn tiny_and_decorative_images_are_skipped() {
        let html = r#"<div class="card">
              <img src="/a.jpg" width="16" height="16">
              <img src="/brand-logo.png">
              <img src="/real.jpg" width="300" height="20">
            </div>"#;
        let rules = RuleSet::new("div.card").with_rule(Field::Image, "img");
        let page = program(&rules, PaginationIntent::disabled()).extract_page(html, BASE);
        assert_eq!(page.records[0].image_url, "https://shop.test/real.jpg");
    }

    #[test]
    fn navigation_containers_are_skipped() {
        let html = r#"
            <div class="item"><ul class="menu">
              <li><a href="/a">A</a></li><li><a href="/b">B</a></li>
              <li><a href="/c">C</a></li><li><a href="/d">D</a></li></ul></div>
            <div class="item"><h3>Real Product</h3><span class="price">$5.00</span></div>"#;
        let rules = RuleSet::new("div.item").with_rule(Field::Title, "h3");
        let page = program(&rules, PaginationIntent::disabled()).extract_page(html, BASE);

        assert_eq!(page.containers_seen, 2);
        assert_eq!(page.skipped_nav, 1);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].title, "Real Product");
    }

    #[test]
    fn next_link_wins_over_query_param() {
        let html = format!(r#"{LISTING_HTML}<a class="next" href="/catalog/more">Next</a>"#);
        let rules = listing_rules().with_rule(Field::NextPage, "a.next");
        let page = program(&rules, PaginationIntent::enabled()).extract_page(&html, BASE);
        assert_eq!(page.next_url.as_deref(), Some("https://shop.test/catalog/more"));
    }

    #[test]
    fn dead_next_link_falls_through() {
        let html = format!(r#"{LISTING_HTML}<a class="next" href="javascript:void(0)">Next</a>"#);
        let rules = listing_rules().with_rule(Field::NextPage, "a.next");
        let page = program(&rules, PaginationIntent::enabled())
            .extract_page(&html, "https://shop.test/catalog?sort=asc");
        assert_eq!(
            page.next_url.as_deref(),
            Some("https://shop.test/catalog?sort=asc&page=2")
        );
    }

    #[test]
    fn next_link_is_tried_before_existing_page_param() {
        let rules = listing_rules().with_rule(Field::NextPage, "a.next");
        let program = program(&rules, PaginationIntent::enabled());
        let url = "https://shop.test/catalog?page=2";

        let linked = format!(r#"{LISTING_HTML}<a class="next" href="/catalog/b">Next</a>"#);
        let page = program.extract_page(&linked, url);
        assert_eq!(page.next_url.as_deref(), Some("https://shop.test/catalog/b"));

        let dead = format!(r##"{LISTING_HTML}<a class="next" href="#">Next</a>"##);
        let page = program.extract_page(&dead, url);
        assert_eq!(page.next_url.as_deref(), Some("https://shop.test/catalog?page=3"));
    }

    #[test]
    fn query_param_increments() {
        assert_eq!(
            next_query_page("https://shop.test/c?page=3&sort=asc", "page", 2).as_deref(),
            Some("https://shop.test/c?page=4&sort=asc")
        );
        assert_eq!(
            next_query_page("https://shop.test/c", "page", 2).as_deref(),
            Some("https://shop.test/c?page=2")
        );
        assert_eq!(next_query_page("https://shop.test/c?page=last", "page", 2), None);
    }

    #[test]
    fn path_segment_increments() {
        assert_eq!(
            next_path_page("https://shop.test/shoes/page/2/", "page").as_deref(),
            Some("https://shop.test/shoes/page/3/")
        );
        assert_eq!(next_path_page("https://shop.test/shoes", "page"), None);
    }

    #[test]
    fn page_numbers_at_the_limit_are_not_applicable() {
        let max = u64::MAX;
        assert_eq!(next_query_page(&format!("https://shop.test/c?page={max}"), "page", 2), None);
        assert_eq!(next_path_page(&format!("https://shop.test/c/page/{max}/"), "page"), None);
    }

    #[test]
    fn path_segment_only_rewrites_the_path() {
        assert_eq!(
            next_path_page("https://shop.test/c/12/page/3?ref=/page/9", "page").as_deref(),
            Some("https://shop.test/c/12/page/4?ref=/page/9")
        );
    }

    #[test]
    fn exhausted_page_number_ends_the_walk() {
        let program = program(&listing_rules(), PaginationIntent::enabled());
        let url = format!("https://shop.test/c/page/{max}?page={max}", max = u64::MAX);
        let page = program.extract_page(LISTING_HTML, &url);
        assert!(page.next_url.is_none());
        assert_eq!(page.records.len(), 3);
    }

    #[test]
    fn titles_outside_length_bounds_fall_through() {
        let long = "x".repeat(TITLE_MAX_CHARS + 1);
        let html = format!(
            r#"<div class="card"><span class="t">ab</span><span class="t">{long}</span>
               <h3>Walnut Side Table</h3></div>"#
        );
        let rules = RuleSet::new("div.card").with_rule(Field::Title, "span.t");
        let page = program(&rules, PaginationIntent::disabled()).extract_page(&html, BASE);
        assert_eq!(page.records[0].title, "Walnut Side Table");

        let exact = "y".repeat(TITLE_MAX_CHARS);
        let html = format!(r#"<div class="card"><span class="t">{exact}</span></div>"#);
        let page = program(&rules, PaginationIntent::disabled()).extract_page(&html, BASE);
        assert_eq!(page.records[0].title, exact);
    }

    #[test]
    fn account_and_search_links_are_not_product_urls() {
        let html = r#"<div class="card">
              <a href="/login?next=/p/1">Sign in</a>
              <a href="/my-account">Account</a>
              <a href="/search?q=mug">More like this</a>
              <a href="/p/mug">Stoneware Mug</a>
            </div>"#;
        let rules = RuleSet::new("div.card").with_rule(Field::Url, "a");
        let page = program(&rules, PaginationIntent::disabled()).extract_page(html, BASE);
        assert_eq!(page.records[0].url, "https://shop.test/p/mug");
    }

    #[test]
    fn path_segment_applies_when_query_param_is_not_numeric() {
        let program = program(&listing_rules(), PaginationIntent::enabled());
        let page = program.extract_page(LISTING_HTML, "https://shop.test/page/4?page=all");
        assert_eq!(
            page.next_url.as_deref(),
            Some("https://shop.test/page/5?page=all")
        );
    }

    #[tokio::test]
    async fn run_respects_min_of_argument_and_bound() {
        let fetcher = MockFetcher::new(LISTING_HTML);
        let program = program(&listing_rules(), PaginationIntent::enabled().with_max_pages(3));

        let outcome = program.run(&fetcher, BASE, 5).await;
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(outcome.records.len(), 9);
        assert_eq!(outcome.stop_reason, StopReason::PageLimit);
        assert_eq!(
            fetcher.fetched(),
            vec![
                BASE.to_string(),
                format!("{BASE}?page=2"),
                format!("{BASE}?page=3"),
            ]
        );

        let fetcher = MockFetcher::new(LISTING_HTML);
        let outcome = program.run(&fetcher, BASE, 2).await;
        assert_eq!(outcome.pages_fetched, 2);
    }

    #[tokio::test]
    async fn disabled_pagination_fetches_one_page() {
        let fetcher = MockFetcher::new(LISTING_HTML);
        let program = program(&listing_rules(), PaginationIntent::disabled());
        let outcome = program.run(&fetcher, BASE, 10).await;
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(fetcher.fetched().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_earlier_records() {
        let fetcher = MockFetcher::empty()
            .with_page(BASE, LISTING_HTML)
            .failing(&format!("{BASE}?page=2"));
        let program = program(&listing_rules(), PaginationIntent::enabled());

        let outcome = program.run(&fetcher, BASE, 10).await;
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.pages_fetched, 1);
        assert!(matches!(outcome.stop_reason, StopReason::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn empty_page_ends_the_walk() {
        let fetcher = MockFetcher::empty()
            .with_page(BASE, LISTING_HTML)
            .with_page(&format!("{BASE}?page=2"), "<html><body>sold out</body></html>");
        let program = program(&listing_rules(), PaginationIntent::enabled());

        let outcome = program.run(&fetcher, BASE, 10).await;
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.stop_reason, StopReason::NoRecords);
    }

    #[tokio::test]
    async fn no_container_yields_nothing() {
        let fetcher = MockFetcher::new(LISTING_HTML);
        let program = program(&RuleSet::default(), PaginationIntent::enabled());
        let outcome = program.run(&fetcher, BASE, 10).await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stop_reason, StopReason::NoContainer);
        assert!(fetcher.fetched().is_empty());
    }

    #[test]
    fn csv_has_fixed_header_and_quotes() {
        let records = vec![Record {
            title: "Mug, large".into(),
            url: "https://shop.test/p/1".into(),
            image_url: NOT_AVAILABLE.into(),
            price: "$3.00".into(),
        }];
        let csv = records_to_csv(&records).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("title,url,image_url,price"));
        assert_eq!(lines.next(), Some("\"Mug, large\",https://shop.test/p/1,N/A,$3.00"));
        assert_eq!(records_to_csv(&[]).unwrap(), "title,url,image_url,price\n");
    }
}
