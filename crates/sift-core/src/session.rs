use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delay::PageDelay;
use crate::error::AppError;
use crate::interpret::RunOutcome;
use crate::models::{Field, RefinementEntry, RuleSet, SampleRecord};
use crate::probe::{ProbeReport, probe};
use crate::program::{ExtractionProgram, PaginationIntent};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::refine::{ConvergenceReport, DEFAULT_MAX_ITERATIONS, Refiner};
use crate::traits::{Fetcher, Judge, SelectorOracle};
use crate::validate::Validator;

/// Configuration for an analysis session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Validation passes allowed per field.
    pub max_iterations: usize,
    pub pagination: PaginationIntent,
    pub delay: PageDelay,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            pagination: PaginationIntent::default(),
            delay: PageDelay::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationIntent) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_delay(mut self, delay: PageDelay) -> Self {
        self.delay = delay;
        self
    }
}

/// Everything a finished session produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub url: String,
    pub probe: ProbeReport,
    pub rules: RuleSet,
    /// Samples extracted with the final rules.
    pub samples: Vec<SampleRecord>,
    pub report: ConvergenceReport,
    pub history: Vec<RefinementEntry>,
    pub program: ExtractionProgram,
    pub message: String,
}

/// Orchestrates a session: fetch → probe → infer → refine → compile.
///
/// Generic over all external dependencies via traits, enabling dependency
/// injection and testability without real HTTP or oracle calls.
pub struct SelectorSession<F, O, J>
where
    F: Fetcher,
    O: SelectorOracle,
    J: Judge,
{
    fetcher: F,
    oracle: O,
    validator: Validator<J>,
    config: SessionConfig,
}

impl<F, O, J> SelectorSession<F, O, J>
where
    F: Fetcher,
    O: SelectorOracle,
    J: Judge,
{
    pub fn new(fetcher: F, oracle: O, validator: Validator<J>, config: SessionConfig) -> Self {
        Self {
            fetcher,
            oracle,
            validator,
            config,
        }
    }

    /// Run a full session for `url`.
    ///
    /// When `supplied` is given, inference is skipped and those rules seed
    /// the loop as-is. A failed fetch, a failed inference or an unusable
    /// inferred rule set aborts the session with an `error` event.
    pub async fn analyze<R: ProgressReporter>(
        &self,
        url: &str,
        supplied: Option<RuleSet>,
        reporter: &R,
    ) -> Result<SessionOutcome, AppError> {
        let session_id = Uuid::new_v4();
        match self.run(session_id, url, supplied, reporter).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let stage = if e.is_fetch_failure() {
                    "fetch"
                } else if e.is_oracle_failure() {
                    "inference"
                } else {
                    "session"
                };
                tracing::error!(%session_id, stage, error = %e, "Session aborted");
                let message = e.to_string();
                reporter.report(ProgressEvent::Error {
                    session_id,
                    message: &message,
                });
                Err(e)
            }
        }
    }

    async fn run<R: ProgressReporter>(
        &self,
        session_id: Uuid,
        url: &str,
        supplied: Option<RuleSet>,
        reporter: &R,
    ) -> Result<SessionOutcome, AppError> {
        // 1. Fetch
        tracing::info!(%session_id, "Fetching {}", url);
        let html = self.fetcher.fetch(url).await?;
        tracing::info!("Fetched {} bytes of HTML", html.len());

        // 2. Probe
        let structure = probe(&html, url);
        tracing::info!(
            containers = structure.containers.len(),
            pagination = structure.pagination.len(),
            "Probed page structure"
        );

        // 3. Initial rules
        let rules = match supplied {
            Some(rules) => {
                tracing::info!("Using supplied rules");
                rules
            }
            None => {
                let rules = self.oracle.infer(&structure, &html).await?;
                rules.ensure_usable()?;
                tracing::info!(
                    container = rules.container.as_deref().unwrap_or("-"),
                    "Inferred initial rules"
                );
                rules
            }
        };
        reporter.report(ProgressEvent::Init {
            session_id,
            url,
            rules: &rules,
            fields: &Field::REFINED,
        });

        // 4. Refine
        let refinement = Refiner::new(&self.oracle, &self.validator, self.config.max_iterations)
            .refine(session_id, &html, url, rules, reporter)
            .await;

        // 5. Compile
        let program = ExtractionProgram::compile(
            &refinement.rules,
            &self.config.pagination,
            self.config.delay,
        );
        let message = refinement.report.message();
        reporter.report(ProgressEvent::Complete {
            session_id,
            rules: &refinement.rules,
            report: &refinement.report,
            history: &refinement.history,
            program: &program,
            message: &message,
        });

        Ok(SessionOutcome {
            session_id,
            url: url.to_string(),
            probe: structure,
            rules: refinement.rules,
            samples: refinement.samples,
            report: refinement.report,
            history: refinement.history,
            program,
            message,
        })
    }

    /// Run a session's compiled program from its start URL.
    pub async fn extract(&self, outcome: &SessionOutcome, max_pages: usize) -> RunOutcome {
        outcome
            .program
            .run(&self.fetcher, &outcome.url, max_pages)
            .await
    }
}
