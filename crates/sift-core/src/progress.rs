//! Progress feed for an analysis session.
//!
//! Events borrow from the session state so reporting never clones the
//! refinement history. Every event serializes to a JSON object tagged by
//! `type` (`init`, `validation`, `complete`, `error`).

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Field, FieldValidation, RefinementEntry, RuleSet, SampleRecord};
use crate::program::ExtractionProgram;
use crate::refine::ConvergenceReport;

/// Events emitted while a session runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent<'a> {
    /// Initial rules are known and refinement is about to start.
    Init {
        session_id: Uuid,
        url: &'a str,
        rules: &'a RuleSet,
        fields: &'a [Field],
    },
    /// One field was judged.
    Validation {
        session_id: Uuid,
        field: Field,
        iteration: usize,
        field_iteration: usize,
        rule: Option<&'a str>,
        samples: &'a [SampleRecord],
        validation: &'a FieldValidation,
        is_final: bool,
    },
    /// Refinement finished and the program was compiled.
    Complete {
        session_id: Uuid,
        rules: &'a RuleSet,
        report: &'a ConvergenceReport,
        history: &'a [RefinementEntry],
        program: &'a ExtractionProgram,
        message: &'a str,
    },
    /// The session aborted.
    Error { session_id: Uuid, message: &'a str },
}

/// Receives session progress. Default implementation ignores everything.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent<'_>) {
        let _ = event;
    }
}

/// Logs progress through `tracing`.
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn report(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::Init {
                session_id,
                url,
                rules,
                ..
            } => {
                tracing::info!(
                    %session_id,
                    %url,
                    container = rules.container.as_deref().unwrap_or("-"),
                    "Session started"
                );
            }
            ProgressEvent::Validation {
                field,
                field_iteration,
                rule,
                validation,
                is_final,
                ..
            } => {
                tracing::info!(
                    %field,
                    field_iteration,
                    rule = rule.unwrap_or("-"),
                    valid = validation.valid,
                    is_final,
                    reason = %validation.reason,
                    "Field validated"
                );
            }
            ProgressEvent::Complete {
                session_id,
                report,
                message,
                ..
            } => {
                tracing::info!(
                    %session_id,
                    total_iterations = report.total_iterations,
                    all_fields_valid = report.all_fields_valid,
                    "{message}"
                );
            }
            ProgressEvent::Error {
                session_id,
                message,
            } => {
                tracing::error!(%session_id, %message, "Session failed");
            }
        }
    }
}
