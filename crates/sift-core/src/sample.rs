//! Sample extractor: materializes a handful of records through a rule set so
//! that each field's rule can be judged on real values.

use scraper::{ElementRef, Html, Selector};

use crate::markup::{element_text, image_source, parse_selector, resolve_url};
use crate::models::{Field, FieldSample, RuleSet, SampleRecord};

/// Maximum number of records sampled per pass.
pub const SAMPLE_LIMIT: usize = 3;

/// Extract up to [`SAMPLE_LIMIT`] sample records from `html`.
///
/// Pure function of its inputs. A missing or unparseable container rule
/// yields no samples; problems with one field never affect the others.
pub fn extract_samples(html: &str, rules: &RuleSet, base_url: &str) -> Vec<SampleRecord> {
    let Some(container_rule) = rules.rule(Field::Container) else {
        tracing::warn!("No container rule provided");
        return Vec::new();
    };
    let Some(container_selector) = parse_selector(container_rule) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let containers: Vec<ElementRef<'_>> = document
        .select(&container_selector)
        .take(SAMPLE_LIMIT)
        .collect();

    if containers.is_empty() {
        tracing::warn!(rule = %container_rule, "Container rule matched nothing");
        return Vec::new();
    }

    // Compile each field rule once; `None` inside means the rule is unparseable.
    let compiled: Vec<(Field, Option<(&str, Option<Selector>)>)> = Field::REFINED
        .iter()
        .map(|field| {
            let entry = rules
                .rule(*field)
                .map(|rule| (rule, parse_selector(rule)));
            (*field, entry)
        })
        .collect();

    containers
        .into_iter()
        .map(|container| {
            let mut record = SampleRecord::default();
            for (field, entry) in &compiled {
                let sample = entry.as_ref().map(|(rule, selector)| match selector {
                    Some(selector) => sample_field(container, *field, rule, selector, base_url),
                    None => FieldSample::missing(rule),
                });
                record.set_field(*field, sample);
            }
            record
        })
        .collect()
}

fn sample_field(
    container: ElementRef<'_>,
    field: Field,
    rule: &str,
    selector: &Selector,
    base_url: &str,
) -> FieldSample {
    let matches: Vec<ElementRef<'_>> = container.select(selector).collect();
    let Some(first) = matches.first().copied() else {
        return FieldSample::missing(rule);
    };

    let resolved = match field {
        Field::Url => matches.iter().find_map(|el| {
            el.value()
                .attr("href")
                .filter(|href| !href.trim().is_empty())
                .map(|href| (*el, resolve_url(base_url, href)))
        }),
        Field::Image => matches
            .iter()
            .find_map(|el| image_source(*el).map(|src| (*el, resolve_url(base_url, &src)))),
        _ => Some((first, element_text(first))).filter(|(_, text)| !text.is_empty()),
    };

    match resolved {
        Some((element, value)) => FieldSample {
            rule: rule.to_string(),
            snippet: Some(element.html()),
            value: Some(value),
        },
        None => FieldSample {
            rule: rule.to_string(),
            snippet: Some(first.html()),
            value: None,
        },
    }
}
