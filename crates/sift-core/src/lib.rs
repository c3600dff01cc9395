pub mod delay;
pub mod error;
pub mod interpret;
pub mod markup;
pub mod models;
pub mod probe;
pub mod program;
pub mod progress;
pub mod refine;
pub mod sample;
pub mod session;
pub mod traits;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

pub use delay::PageDelay;
pub use error::AppError;
pub use interpret::{RunOutcome, StopReason, records_to_csv};
pub use models::{
    Field, FieldSample, FieldValidation, Record, RefinementEntry, RuleSet, SampleRecord,
};
pub use probe::{ProbeReport, probe};
pub use program::{ExtractionProgram, PaginationIntent};
pub use progress::{ProgressEvent, ProgressReporter, TracingProgressReporter};
pub use refine::{ConvergenceReport, FieldState, Refiner};
pub use sample::extract_samples;
pub use session::{SelectorSession, SessionConfig, SessionOutcome};
pub use traits::{Fetcher, Judge, NullOracle, SelectorOracle, Verdict};
pub use validate::{Strategy, Validator};
