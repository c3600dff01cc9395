use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Shown for a field whose rule matched nothing.
pub const NOT_FOUND: &str = "Not found";
/// Shown for a field with no configured rule.
pub const NO_RULE: &str = "No selector";
/// Shown for a field whose element matched but exposed no usable value.
pub const NO_USABLE_VALUE: &str = "Found element but no usable value";
/// Default for every field of an extracted [`Record`].
pub const NOT_AVAILABLE: &str = "N/A";

/// Returns true for the sentinel strings that stand in for a missing value.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value == NOT_FOUND
        || value == NO_RULE
        || value == NO_USABLE_VALUE
        || value == NOT_AVAILABLE
}

/// A slot of a [`RuleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Container,
    Title,
    Url,
    Image,
    Price,
    NextPage,
}

impl Field {
    /// Data fields refined by the loop, in the order they are processed.
    pub const REFINED: [Field; 4] = [Field::Title, Field::Url, Field::Image, Field::Price];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Container => "container",
            Field::Title => "title",
            Field::Url => "url",
            Field::Image => "image",
            Field::Price => "price",
            Field::NextPage => "next_page",
        }
    }

    /// Human-readable label used in oracle prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Container => "Product Container",
            Field::Title => "Product Title",
            Field::Url => "Product URL",
            Field::Image => "Product Image",
            Field::Price => "Product Price",
            Field::NextPage => "Next Page Link",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches("product_") {
            "container" => Ok(Field::Container),
            "title" => Ok(Field::Title),
            "url" => Ok(Field::Url),
            "image" => Ok(Field::Image),
            "price" => Ok(Field::Price),
            "next_page" | "pagination_next" => Ok(Field::NextPage),
            other => Err(format!("Unknown field: {other}")),
        }
    }
}

/// Structural rules (CSS selectors) locating one product record and its fields.
///
/// Field rules are relative to the container. Rules are opaque strings here;
/// only the markup layer interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, alias = "product_container")]
    pub container: Option<String>,
    #[serde(default, alias = "product_title")]
    pub title: Option<String>,
    #[serde(default, alias = "product_url")]
    pub url: Option<String>,
    #[serde(default, alias = "product_image")]
    pub image: Option<String>,
    #[serde(default, alias = "product_price")]
    pub price: Option<String>,
    #[serde(default, alias = "pagination_next")]
    pub next_page: Option<String>,
}

impl RuleSet {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, field: Field, rule: impl Into<String>) -> Self {
        self.set_rule(field, Some(rule.into()));
        self
    }

    /// The configured rule for `field`; blank rules count as absent.
    pub fn rule(&self, field: Field) -> Option<&str> {
        let slot = match field {
            Field::Container => &self.container,
            Field::Title => &self.title,
            Field::Url => &self.url,
            Field::Image => &self.image,
            Field::Price => &self.price,
            Field::NextPage => &self.next_page,
        };
        slot.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    pub fn set_rule(&mut self, field: Field, rule: Option<String>) {
        let slot = match field {
            Field::Container => &mut self.container,
            Field::Title => &mut self.title,
            Field::Url => &mut self.url,
            Field::Image => &mut self.image,
            Field::Price => &mut self.price,
            Field::NextPage => &mut self.next_page,
        };
        *slot = rule;
    }

    /// A container rule plus at least one data field rule.
    pub fn is_usable(&self) -> bool {
        self.rule(Field::Container).is_some()
            && Field::REFINED.iter().any(|f| self.rule(*f).is_some())
    }

    pub fn ensure_usable(&self) -> Result<(), AppError> {
        if self.rule(Field::Container).is_none() {
            return Err(AppError::UnusableRules("no container rule".into()));
        }
        if !Field::REFINED.iter().any(|f| self.rule(*f).is_some()) {
            return Err(AppError::UnusableRules("no data field rule".into()));
        }
        Ok(())
    }
}

/// One field of one sampled record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSample {
    /// Rule used to locate the element.
    pub rule: String,
    /// Outer HTML of the matched element, if anything matched.
    pub snippet: Option<String>,
    /// Resolved value, if the match exposed one.
    pub value: Option<String>,
}

impl FieldSample {
    pub fn missing(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            snippet: None,
            value: None,
        }
    }
}

/// One candidate record as seen through the current rule set.
///
/// A `None` field means no rule was configured for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub title: Option<FieldSample>,
    pub url: Option<FieldSample>,
    pub image: Option<FieldSample>,
    pub price: Option<FieldSample>,
}

impl SampleRecord {
    pub fn field(&self, field: Field) -> Option<&FieldSample> {
        match field {
            Field::Title => self.title.as_ref(),
            Field::Url => self.url.as_ref(),
            Field::Image => self.image.as_ref(),
            Field::Price => self.price.as_ref(),
            Field::Container | Field::NextPage => None,
        }
    }

    pub fn set_field(&mut self, field: Field, sample: Option<FieldSample>) {
        match field {
            Field::Title => self.title = sample,
            Field::Url => self.url = sample,
            Field::Image => self.image = sample,
            Field::Price => self.price = sample,
            Field::Container | Field::NextPage => {}
        }
    }

    /// The field's value, or the sentinel describing why there is none.
    pub fn display_value(&self, field: Field) -> &str {
        match self.field(field) {
            None => NO_RULE,
            Some(FieldSample { value: Some(v), .. }) => v.as_str(),
            Some(FieldSample { snippet: None, .. }) => NOT_FOUND,
            Some(FieldSample { snippet: Some(_), .. }) => NO_USABLE_VALUE,
        }
    }
}

/// Verdict on one field's rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidation {
    pub field: Field,
    pub valid: bool,
    pub reason: String,
    /// Improvement hint, present on invalid verdicts from the heuristic judge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl FieldValidation {
    pub fn valid(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            valid: true,
            reason: reason.into(),
            suggestion: None,
        }
    }

    pub fn invalid(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            valid: false,
            reason: reason.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Immutable audit record appended on every validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementEntry {
    /// Session-wide sequence number, starting at 1.
    pub iteration: usize,
    pub field: Field,
    /// Improvement attempts already spent on this field, starting at 0.
    pub field_iteration: usize,
    pub rules: RuleSet,
    pub samples: Vec<SampleRecord>,
    pub validation: FieldValidation,
    pub recorded_at: DateTime<Utc>,
}

/// One product as produced by a compiled extraction program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub url: String,
    pub image_url: String,
    pub price: String,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            title: NOT_AVAILABLE.to_string(),
            url: NOT_AVAILABLE.to_string(),
            image_url: NOT_AVAILABLE.to_string(),
            price: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, compute_hash("hello"));
    }

    #[test]
    fn rule_set_accepts_long_keys() {
        let rules: RuleSet = serde_json::from_value(serde_json::json!({
            "product_container": "div.product",
            "product_title": "h3",
            "product_price": null,
            "pagination_next": "a.next"
        }))
        .unwrap();

        assert_eq!(rules.rule(Field::Container), Some("div.product"));
        assert_eq!(rules.rule(Field::Title), Some("h3"));
        assert_eq!(rules.rule(Field::Price), None);
        assert_eq!(rules.rule(Field::NextPage), Some("a.next"));
    }

    #[test]
    fn blank_rules_are_absent() {
        let rules = RuleSet::new("  ").with_rule(Field::Title, "");
        assert_eq!(rules.rule(Field::Container), None);
        assert_eq!(rules.rule(Field::Title), None);
        assert!(!rules.is_usable());
    }

    #[test]
    fn usability_needs_container_and_data_field() {
        assert!(!RuleSet::new("div.item").is_usable());
        assert!(RuleSet::new("div.item").with_rule(Field::Price, ".p").is_usable());
        assert!(matches!(
            RuleSet::default().with_rule(Field::Title, "h2").ensure_usable(),
            Err(AppError::UnusableRules(_))
        ));
    }

    #[test]
    fn display_value_distinguishes_gaps() {
        let mut record = SampleRecord::default();
        assert_eq!(record.display_value(Field::Title), NO_RULE);

        record.set_field(Field::Title, Some(FieldSample::missing("h3")));
        assert_eq!(record.display_value(Field::Title), NOT_FOUND);

        record.set_field(
            Field::Image,
            Some(FieldSample {
                rule: "img".into(),
                snippet: Some("<img>".into()),
                value: None,
            }),
        );
        assert_eq!(record.display_value(Field::Image), NO_USABLE_VALUE);
        assert!(is_placeholder(record.display_value(Field::Image)));
    }

    #[test]
    fn field_parses_both_key_styles() {
        assert_eq!("product_price".parse::<Field>(), Ok(Field::Price));
        assert_eq!("next_page".parse::<Field>(), Ok(Field::NextPage));
        assert!("colour".parse::<Field>().is_err());
    }

    #[test]
    fn record_defaults_to_not_available() {
        let record = Record::default();
        assert_eq!(record.title, NOT_AVAILABLE);
        assert_eq!(record.price, NOT_AVAILABLE);
    }
}
