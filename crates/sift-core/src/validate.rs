//! Rule validator. Two interchangeable strategies judge whether a field's
//! rule is correct: an oracle-backed judge and a deterministic heuristic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Field, FieldSample, FieldValidation, RuleSet, SampleRecord, is_placeholder};
use crate::traits::Judge;

/// Currency symbols accepted by the heuristic price check.
const CURRENCY_SYMBOLS: [char; 6] = ['$', '€', '£', '¥', '₹', '₽'];

/// Title length bounds (in characters): `MIN <= len < MAX`.
const TITLE_MIN_CHARS: usize = 5;
const TITLE_MAX_CHARS: usize = 200;

/// How a field is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Oracle,
    Heuristic,
}

/// Guidance handed to the judging oracle for each field.
pub fn field_guidance(field: Field) -> &'static str {
    match field {
        Field::Container => "Should match each repeated product record on the page",
        Field::Title => "Should be descriptive product name, 3-100 chars",
        Field::Url => "Should be valid product page URL",
        Field::Image => "Should be valid image file URL",
        Field::Price => "Should have currency symbol or decimal number",
        Field::NextPage => "Should be a link to the next page of results",
    }
}

/// Validates one field at a time, choosing a strategy per field.
///
/// Without a judge every field falls back to the heuristic strategy.
#[derive(Debug, Clone)]
pub struct Validator<J> {
    judge: Option<J>,
    overrides: BTreeMap<Field, Strategy>,
}

impl<J: Judge> Validator<J> {
    /// A validator that never consults an oracle.
    pub fn heuristic() -> Self {
        Self {
            judge: None,
            overrides: BTreeMap::new(),
        }
    }

    /// A validator that consults `judge` for every data field by default.
    pub fn with_judge(judge: J) -> Self {
        Self {
            judge: Some(judge),
            overrides: BTreeMap::new(),
        }
    }

    /// Force a strategy for a single field.
    pub fn with_strategy(mut self, field: Field, strategy: Strategy) -> Self {
        self.overrides.insert(field, strategy);
        self
    }

    /// The strategy that will judge `field`.
    pub fn strategy_for(&self, field: Field) -> Strategy {
        if self.judge.is_none() || field == Field::Container {
            return Strategy::Heuristic;
        }
        self.overrides
            .get(&field)
            .copied()
            .unwrap_or(Strategy::Oracle)
    }

    /// Judge a single field. Never fails: oracle trouble becomes an invalid verdict.
    pub async fn validate_field(
        &self,
        field: Field,
        samples: &[SampleRecord],
        rules: &RuleSet,
    ) -> FieldValidation {
        match (self.strategy_for(field), &self.judge) {
            (Strategy::Oracle, Some(judge)) => judge_with_oracle(judge, field, samples).await,
            _ => heuristic_field(field, samples, rules),
        }
    }
}

async fn judge_with_oracle<J: Judge>(
    judge: &J,
    field: Field,
    samples: &[SampleRecord],
) -> FieldValidation {
    if samples.is_empty() {
        return FieldValidation::invalid(field, "No sample data available to validate");
    }

    let field_samples: Vec<FieldSample> = samples
        .iter()
        .filter_map(|s| s.field(field).cloned())
        .collect();

    match judge
        .judge(field, &field_samples, field_guidance(field))
        .await
    {
        Ok(verdict) => FieldValidation {
            field,
            valid: verdict.valid,
            reason: verdict.reason,
            suggestion: None,
        },
        Err(e) => {
            tracing::warn!(%field, error = %e, "Judging oracle failed, marking field invalid");
            FieldValidation::invalid(field, format!("Oracle judgement failed: {e}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Heuristic strategy
// ---------------------------------------------------------------------------

/// Heuristically judge one field from its samples.
pub fn heuristic_field(field: Field, samples: &[SampleRecord], rules: &RuleSet) -> FieldValidation {
    if field == Field::Container {
        return container_verdict(samples, rules);
    }

    let (noun, check, suggestion): (&str, fn(&str) -> bool, &str) = match field {
        Field::Title => (
            "titles",
            plausible_title as fn(&str) -> bool,
            "Try a more specific selector targeting the product title text",
        ),
        Field::Url => (
            "URLs",
            plausible_url as fn(&str) -> bool,
            "Look for 'a' elements with href attributes in the product container",
        ),
        Field::Image => (
            "images",
            plausible_image as fn(&str) -> bool,
            "Look for 'img' elements with src attributes in the product container",
        ),
        Field::Price => (
            "prices",
            plausible_price as fn(&str) -> bool,
            "Look for elements containing currency symbols or numeric values with decimals",
        ),
        Field::Container | Field::NextPage => {
            return FieldValidation::invalid(field, "Field is not validated from samples");
        }
    };

    let good = samples
        .iter()
        .map(|s| s.display_value(field))
        .filter(|value| !is_placeholder(value) && check(value))
        .count();
    let valid = good > 0 && good * 2 >= samples.len();

    let reason = if rules.rule(field).is_some() {
        format!(
            "{} selector found valid {noun} in {good}/{} products",
            capitalized(field),
            samples.len()
        )
    } else {
        format!("No {field} selector provided")
    };

    if valid {
        FieldValidation::valid(field, reason)
    } else {
        FieldValidation::invalid(field, reason).with_suggestion(suggestion)
    }
}

fn container_verdict(samples: &[SampleRecord], rules: &RuleSet) -> FieldValidation {
    if rules.rule(Field::Container).is_none() {
        return FieldValidation::invalid(Field::Container, "No container selector provided")
            .with_suggestion("You need to provide a container selector");
    }
    if samples.is_empty() {
        return FieldValidation::invalid(
            Field::Container,
            "Container selector did not find products",
        )
        .with_suggestion("Try a more general selector that captures product items");
    }
    FieldValidation::valid(Field::Container, "Container selector found multiple products")
}

fn capitalized(field: Field) -> &'static str {
    match field {
        Field::Container => "Container",
        Field::Title => "Title",
        Field::Url => "URL",
        Field::Image => "Image",
        Field::Price => "Price",
        Field::NextPage => "Next page",
    }
}

fn plausible_title(value: &str) -> bool {
    let len = value.chars().count();
    (TITLE_MIN_CHARS..TITLE_MAX_CHARS).contains(&len)
}

fn plausible_url(value: &str) -> bool {
    value.contains("http") || value.starts_with('/')
}

fn plausible_image(value: &str) -> bool {
    value.contains("http") || value.starts_with('/') || value.contains('.')
}

fn plausible_price(value: &str) -> bool {
    value.contains(CURRENCY_SYMBOLS)
        || (value.chars().any(|c| c.is_ascii_digit())
            && (value.contains('.') || value.contains(',')))
}
