//! Refinement loop: validate each data field in turn and ask the oracle for
//! a corrected rule until the field passes or its attempt budget runs out.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Field, FieldValidation, RefinementEntry, RuleSet, SampleRecord};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::sample::extract_samples;
use crate::traits::{Judge, SelectorOracle};
use crate::validate::{Validator, heuristic_field};

/// Default number of validation passes allowed per field.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Where a field stands in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Not yet validated.
    Pending,
    Validating,
    /// Waiting for the oracle's corrected rule.
    Improving,
    /// Validated; its rule is frozen.
    Converged,
    /// Still invalid after the last allowed pass.
    Exhausted,
}

impl FieldState {
    /// Converged and exhausted fields are never validated again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FieldState::Converged | FieldState::Exhausted)
    }
}

/// Final standing of one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOutcome {
    pub state: FieldState,
    pub valid: bool,
    pub reason: String,
    /// Hint from the last failed verdict.
    pub suggestion: Option<String>,
    /// Improvement attempts spent on the field.
    pub attempts: usize,
}

/// Result of running the loop over every data field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub fields: BTreeMap<Field, FieldOutcome>,
    /// Verdict on the container rule. It is reported but never refined.
    pub container: FieldValidation,
    /// Improvement attempts across all fields. Informational only.
    pub total_iterations: usize,
    pub all_fields_valid: bool,
}

impl ConvergenceReport {
    pub fn valid_count(&self) -> usize {
        self.fields.values().filter(|o| o.valid).count()
    }

    /// Hints for the container and every field that did not converge.
    pub fn suggestions(&self) -> BTreeMap<Field, &str> {
        let container = (!self.container.valid)
            .then(|| self.container.suggestion.as_deref().map(|s| (Field::Container, s)))
            .flatten();
        self.fields
            .iter()
            .filter(|(_, o)| !o.valid)
            .filter_map(|(f, o)| o.suggestion.as_deref().map(|s| (*f, s)))
            .chain(container)
            .collect()
    }

    /// Human summary, e.g. `"3 of 4 fields valid"`.
    pub fn message(&self) -> String {
        if self.all_fields_valid {
            "All selectors validated successfully".to_string()
        } else {
            format!("{} of {} fields valid", self.valid_count(), self.fields.len())
        }
    }
}

/// Everything the loop produced.
#[derive(Debug, Clone)]
pub struct Refinement {
    pub rules: RuleSet,
    pub samples: Vec<SampleRecord>,
    pub report: ConvergenceReport,
    pub history: Vec<RefinementEntry>,
}

/// Drives the per-field validate/improve cycle against one page.
pub struct Refiner<'a, O, J> {
    oracle: &'a O,
    validator: &'a Validator<J>,
    max_iterations: usize,
}

impl<'a, O: SelectorOracle, J: Judge> Refiner<'a, O, J> {
    /// `max_iterations` is clamped to at least one pass per field.
    pub fn new(oracle: &'a O, validator: &'a Validator<J>, max_iterations: usize) -> Self {
        Self {
            oracle,
            validator,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Run the loop. Never fails: oracle trouble only costs attempts.
    pub async fn refine<R: ProgressReporter>(
        &self,
        session_id: Uuid,
        html: &str,
        base_url: &str,
        rules: RuleSet,
        reporter: &R,
    ) -> Refinement {
        let mut rules = rules;
        let mut samples = extract_samples(html, &rules, base_url);
        let mut history: Vec<RefinementEntry> = Vec::new();
        let mut fields = BTreeMap::new();
        let mut total_iterations = 0;

        for field in Field::REFINED {
            let mut state = FieldState::Pending;
            let mut attempts = 0;
            let mut verdict = FieldValidation::invalid(field, "Not validated");

            while !state.is_terminal() {
                state = FieldState::Validating;
                tracing::debug!(%field, attempts, ?state, "Validating field");
                verdict = self.validator.validate_field(field, &samples, &rules).await;
                let is_final = verdict.valid || attempts + 1 >= self.max_iterations;

                history.push(RefinementEntry {
                    iteration: history.len() + 1,
                    field,
                    field_iteration: attempts,
                    rules: rules.clone(),
                    samples: samples.clone(),
                    validation: verdict.clone(),
                    recorded_at: Utc::now(),
                });
                reporter.report(ProgressEvent::Validation {
                    session_id,
                    field,
                    iteration: history.len(),
                    field_iteration: attempts,
                    rule: rules.rule(field),
                    samples: &samples,
                    validation: &verdict,
                    is_final,
                });

                state = if verdict.valid {
                    FieldState::Converged
                } else if is_final {
                    FieldState::Exhausted
                } else {
                    FieldState::Improving
                };

                match state {
                    FieldState::Exhausted => {
                        tracing::warn!(
                            %field,
                            attempts,
                            reason = %verdict.reason,
                            "Field exhausted its attempts"
                        );
                    }
                    FieldState::Improving => {
                        tracing::debug!(%field, "Requesting improved rule");
                        self.improve_field(field, html, base_url, &mut rules, &verdict)
                            .await;
                        samples = extract_samples(html, &rules, base_url);
                        attempts += 1;
                        total_iterations += 1;
                    }
                    _ => {}
                }
            }

            fields.insert(
                field,
                FieldOutcome {
                    state,
                    valid: verdict.valid,
                    reason: verdict.reason,
                    suggestion: verdict.suggestion,
                    attempts,
                },
            );
        }

        let container = heuristic_field(Field::Container, &samples, &rules);
        let all_fields_valid = fields.values().all(|o| o.valid);

        Refinement {
            rules,
            samples,
            report: ConvergenceReport {
                fields,
                container,
                total_iterations,
                all_fields_valid,
            },
            history,
        }
    }

    /// Adopt the oracle's rule for `field` only. Every other slot stays as is.
    async fn improve_field(
        &self,
        field: Field,
        html: &str,
        base_url: &str,
        rules: &mut RuleSet,
        failing: &FieldValidation,
    ) {
        match self.oracle.improve(html, rules, failing, base_url).await {
            Ok(proposed) => match proposed.rule(field) {
                Some(rule) if Some(rule) != rules.rule(field) => {
                    tracing::info!(%field, %rule, "Adopted improved rule");
                    rules.set_rule(field, Some(rule.to_string()));
                }
                _ => {
                    tracing::debug!(%field, "Oracle proposed no change");
                }
            },
            Err(e) => {
                tracing::warn!(%field, error = %e, "Improvement failed");
            }
        }
    }
}
