//! Extraction-program compiler.
//!
//! A program is plain data: per-field rule cascades, a pagination strategy
//! cascade and run bounds. It serializes to JSON so a CLI or a store can
//! keep it around and re-run it later. Execution lives in [`crate::interpret`].

use serde::{Deserialize, Serialize};

use crate::delay::PageDelay;
use crate::error::AppError;
use crate::models::{Field, RuleSet};

/// Page ceiling applied when pagination is enabled without an explicit one.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Generic title rules tried after the resolved one.
pub const TITLE_FALLBACKS: [&str; 13] = [
    ".product-title",
    ".product-name",
    ".title",
    ".name",
    "h1.product-title",
    "h2.product-title",
    "h3.product-title",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "a[title]",
];

/// Generic URL rules tried after the resolved one.
pub const URL_FALLBACKS: [&str; 6] = [
    "a.product-link",
    "a.details",
    ".product-title a",
    ".title a",
    ".name a",
    "a:not(.pagination-link):not(.nav-link)",
];

/// Generic image rules tried after the resolved one.
pub const IMAGE_FALLBACKS: [&str; 9] = [
    ".product-image",
    ".product-img",
    ".product-photo",
    "a:first-child img",
    ".product-thumbnail img",
    ".image img",
    "img.product",
    "img.thumbnail",
    "img",
];

/// Generic price rules tried after the resolved one.
pub const PRICE_FALLBACKS: [&str; 11] = [
    ".price",
    ".product-price",
    ".offer-price",
    ".sale-price",
    "span.price",
    "div.price",
    "p.price",
    ".cost",
    ".amount",
    ".value",
    "[itemprop='price']",
];

/// Symbols the price content scan looks for.
pub const SCAN_SYMBOLS: [&str; 3] = ["$", "€", "£"];

/// One step of a field cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeStep {
    /// Match a rule inside the container.
    Rule { rule: String },
    /// Take the innermost element whose text mentions one of `symbols`.
    ContentScan { symbols: Vec<String> },
}

impl CascadeStep {
    pub fn rule(rule: impl Into<String>) -> Self {
        CascadeStep::Rule { rule: rule.into() }
    }
}

/// Ordered fallbacks for every data field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCascades {
    pub title: Vec<CascadeStep>,
    pub url: Vec<CascadeStep>,
    pub image: Vec<CascadeStep>,
    pub price: Vec<CascadeStep>,
}

impl FieldCascades {
    pub fn for_field(&self, field: Field) -> &[CascadeStep] {
        match field {
            Field::Title => &self.title,
            Field::Url => &self.url,
            Field::Image => &self.image,
            Field::Price => &self.price,
            Field::Container | Field::NextPage => &[],
        }
    }
}

/// How to find the next page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Follow the `href` of the first element matching `rule`.
    NextLink { rule: String },
    /// Increment query parameter `name`, or add it with `first_value`.
    QueryParam { name: String, first_value: u32 },
    /// Increment the number following `/<segment>/` in the path.
    PathSegment { segment: String },
}

/// Hard limits of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBounds {
    pub max_pages: usize,
    pub delay: PageDelay,
}

/// Whether and how a compiled program walks beyond the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationIntent {
    pub enabled: bool,
    /// Overrides the rule set's `next_page` rule.
    pub next_rule: Option<String>,
    pub max_pages: usize,
}

impl PaginationIntent {
    /// Single page only.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            next_rule: None,
            max_pages: 1,
        }
    }

    /// Walk up to [`DEFAULT_MAX_PAGES`] pages.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            next_rule: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_next_rule(mut self, rule: impl Into<String>) -> Self {
        self.next_rule = Some(rule.into());
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

impl Default for PaginationIntent {
    fn default() -> Self {
        Self::disabled()
    }
}

/// A compiled, self-contained extraction program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionProgram {
    /// Record container rule. Without one the program yields nothing.
    pub container: Option<String>,
    pub fields: FieldCascades,
    pub pagination: Vec<PaginationStrategy>,
    pub bounds: RunBounds,
}

impl ExtractionProgram {
    /// Compile `rules` into a program.
    ///
    /// Each resolved field rule leads its cascade and is followed by the
    /// generic fallbacks. Disabled pagination pins the run to one page.
    pub fn compile(rules: &RuleSet, pagination: &PaginationIntent, delay: PageDelay) -> Self {
        let container = rules.rule(Field::Container).map(str::to_string);
        if container.is_none() {
            tracing::warn!("Compiling a program without a container rule; it will yield nothing");
        }

        let fields = FieldCascades {
            title: cascade(rules.rule(Field::Title), &TITLE_FALLBACKS),
            url: cascade(rules.rule(Field::Url), &URL_FALLBACKS),
            image: cascade(rules.rule(Field::Image), &IMAGE_FALLBACKS),
            price: {
                let mut steps = cascade(rules.rule(Field::Price), &PRICE_FALLBACKS);
                steps.push(CascadeStep::ContentScan {
                    symbols: SCAN_SYMBOLS.iter().map(|s| s.to_string()).collect(),
                });
                steps
            },
        };

        let (strategies, max_pages) = if pagination.enabled {
            let next_rule = pagination
                .next_rule
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .or_else(|| rules.rule(Field::NextPage));
            let mut strategies = Vec::with_capacity(3);
            if let Some(rule) = next_rule {
                strategies.push(PaginationStrategy::NextLink {
                    rule: rule.to_string(),
                });
            }
            strategies.push(PaginationStrategy::QueryParam {
                name: "page".into(),
                first_value: 2,
            });
            strategies.push(PaginationStrategy::PathSegment {
                segment: "page".into(),
            });
            (strategies, pagination.max_pages.max(1))
        } else {
            (Vec::new(), 1)
        };

        Self {
            container,
            fields,
            pagination: strategies,
            bounds: RunBounds { max_pages, delay },
        }
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn cascade(resolved: Option<&str>, fallbacks: &[&str]) -> Vec<CascadeStep> {
    let mut steps: Vec<CascadeStep> = resolved.into_iter().map(CascadeStep::rule).collect();
    for rule in fallbacks {
        if Some(*rule) != resolved {
            steps.push(CascadeStep::rule(*rule));
        }
    }
    steps
}
