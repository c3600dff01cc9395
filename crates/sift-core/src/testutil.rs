//! Test utilities: fixtures and mock implementations of the core traits.
//!
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{Field, FieldSample, FieldValidation, RuleSet, SampleRecord};
use crate::probe::ProbeReport;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::traits::{Fetcher, Judge, SelectorOracle, Verdict};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A small, well-formed product listing with three records.
pub const LISTING_HTML: &str = r#"<html>
<head><title>Catalog</title></head>
<body>
  <div class="products">
    <div class="product-item">
      <h3>Classic Leather Wallet</h3>
      <a href="/products/1"><img src="/img/1.jpg" alt="wallet"></a>
      <span class="price">$9.99</span>
    </div>
    <div class="product-item">
      <h3>Canvas Tote Bag</h3>
      <a href="/products/2"><img src="/img/2.jpg" alt="tote"></a>
      <span class="price">$19.99</span>
    </div>
    <div class="product-item">
      <h3>Wool Winter Scarf</h3>
      <a href="/products/3"><img src="/img/3.jpg" alt="scarf"></a>
      <span class="price">$29.99</span>
    </div>
  </div>
</body>
</html>"#;

/// Rules that resolve every field of [`LISTING_HTML`].
pub fn listing_rules() -> RuleSet {
    RuleSet::new("div.product-item")
        .with_rule(Field::Title, "h3")
        .with_rule(Field::Url, "a")
        .with_rule(Field::Image, "img")
        .with_rule(Field::Price, "span.price")
}

/// A sample record with only `field` populated.
pub fn sample_with(field: Field, value: &str) -> SampleRecord {
    let mut record = SampleRecord::default();
    record.set_field(
        field,
        Some(FieldSample {
            rule: "test".to_string(),
            snippet: Some(format!("<span>{value}</span>")),
            value: Some(value.to_string()),
        }),
    );
    record
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher serving pages by URL, recording every request.
#[derive(Clone)]
pub struct MockFetcher {
    pages: Arc<HashMap<String, String>>,
    /// Served for any URL without a page of its own.
    fallback: Option<Arc<String>>,
    failures: Arc<HashSet<String>>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    /// Serves `html` for every URL.
    pub fn new(html: &str) -> Self {
        Self {
            fallback: Some(Arc::new(html.to_string())),
            ..Self::empty()
        }
    }

    /// Serves nothing; unknown URLs fail with a 404.
    pub fn empty() -> Self {
        Self {
            pages: Arc::new(HashMap::new()),
            fallback: None,
            failures: Arc::new(HashSet::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), html.to_string());
        self
    }

    /// Requests for `url` fail with a 500.
    pub fn failing(mut self, url: &str) -> Self {
        Arc::make_mut(&mut self.failures).insert(url.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.failures.contains(url) {
            return Err(AppError::HttpError(format!("HTTP 500 for {url}")));
        }
        if let Some(html) = self.pages.get(url) {
            return Ok(html.clone());
        }
        match &self.fallback {
            Some(html) => Ok(html.to_string()),
            None => Err(AppError::HttpError(format!("HTTP 404 for {url}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockOracle
// ---------------------------------------------------------------------------

/// Mock selector oracle with scripted answers.
///
/// Each call pops the first queued response; an empty queue yields a
/// malformed-response error.
#[derive(Clone, Default)]
pub struct MockOracle {
    inferences: Arc<Mutex<Vec<Result<RuleSet, AppError>>>>,
    improvements: Arc<Mutex<Vec<Result<RuleSet, AppError>>>>,
    pub infer_calls: Arc<Mutex<usize>>,
    /// Failing field and the rules in force for every improve call.
    pub improve_calls: Arc<Mutex<Vec<(Field, RuleSet)>>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inference(self, response: Result<RuleSet, AppError>) -> Self {
        self.inferences.lock().unwrap().push(response);
        self
    }

    pub fn with_improvements(self, responses: Vec<Result<RuleSet, AppError>>) -> Self {
        self.improvements.lock().unwrap().extend(responses);
        self
    }
}

impl SelectorOracle for MockOracle {
    async fn infer(&self, _probe: &ProbeReport, _html: &str) -> Result<RuleSet, AppError> {
        *self.infer_calls.lock().unwrap() += 1;
        let mut queue = self.inferences.lock().unwrap();
        if queue.is_empty() {
            Err(AppError::MalformedResponse("no scripted inference".into()))
        } else {
            queue.remove(0)
        }
    }

    async fn improve(
        &self,
        _html: &str,
        rules: &RuleSet,
        failing: &FieldValidation,
        _base_url: &str,
    ) -> Result<RuleSet, AppError> {
        self.improve_calls
            .lock()
            .unwrap()
            .push((failing.field, rules.clone()));
        let mut queue = self.improvements.lock().unwrap();
        if queue.is_empty() {
            Err(AppError::MalformedResponse("no scripted improvement".into()))
        } else {
            queue.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockJudge
// ---------------------------------------------------------------------------

/// Mock judging oracle. Queued responses first, then the sticky default.
#[derive(Clone)]
pub struct MockJudge {
    responses: Arc<Mutex<Vec<Result<Verdict, AppError>>>>,
    default: Verdict,
    pub calls: Arc<Mutex<Vec<Field>>>,
}

impl MockJudge {
    pub fn always(valid: bool, reason: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default: Verdict {
                valid,
                reason: reason.to_string(),
            },
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<Result<Verdict, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::always(true, "default verdict")
        }
    }
}

impl Judge for MockJudge {
    async fn judge(
        &self,
        field: Field,
        _samples: &[FieldSample],
        _guidance: &str,
    ) -> Result<Verdict, AppError> {
        self.calls.lock().unwrap().push(field);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Records every progress event as JSON.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `type` tag of every event, in order.
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl ProgressReporter for MockReporter {
    fn report(&self, event: ProgressEvent<'_>) {
        let value = serde_json::to_value(&event).unwrap();
        self.events.lock().unwrap().push(value);
    }
}
