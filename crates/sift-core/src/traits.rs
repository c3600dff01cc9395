use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Field, FieldSample, FieldValidation, RuleSet};
use crate::probe::ProbeReport;

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Proposes and corrects rule sets from page content.
///
/// Treated as untrusted: malformed answers must surface as errors.
pub trait SelectorOracle: Send + Sync + Clone {
    /// Propose an initial rule set from the prober's findings and the markup.
    fn infer(
        &self,
        probe: &ProbeReport,
        html: &str,
    ) -> impl Future<Output = Result<RuleSet, AppError>> + Send;

    /// Propose a correction for the single field described by `failing`.
    ///
    /// Returns the full rule set; callers only take the failing field from it.
    fn improve(
        &self,
        html: &str,
        rules: &RuleSet,
        failing: &FieldValidation,
        base_url: &str,
    ) -> impl Future<Output = Result<RuleSet, AppError>> + Send;
}

/// A judging oracle's verdict on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    #[serde(default)]
    pub reason: String,
}

/// Judges whether a field's samples show a correct rule.
pub trait Judge: Send + Sync + Clone {
    fn judge(
        &self,
        field: Field,
        samples: &[FieldSample],
        guidance: &str,
    ) -> impl Future<Output = Result<Verdict, AppError>> + Send;
}

/// Stand-in for an unconfigured oracle. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOracle;

impl SelectorOracle for NullOracle {
    async fn infer(&self, _probe: &ProbeReport, _html: &str) -> Result<RuleSet, AppError> {
        Err(AppError::ConfigError("no selector oracle configured".into()))
    }

    async fn improve(
        &self,
        _html: &str,
        _rules: &RuleSet,
        _failing: &FieldValidation,
        _base_url: &str,
    ) -> Result<RuleSet, AppError> {
        Err(AppError::ConfigError("no selector oracle configured".into()))
    }
}

impl Judge for NullOracle {
    async fn judge(
        &self,
        _field: Field,
        _samples: &[FieldSample],
        _guidance: &str,
    ) -> Result<Verdict, AppError> {
        Err(AppError::ConfigError("no judging oracle configured".into()))
    }
}
