use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sift_core::error::AppError;
use sift_core::models::{Field, FieldSample, FieldValidation, RuleSet};
use sift_core::probe::ProbeReport;
use sift_core::traits::{Judge, SelectorOracle, Verdict};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Per-request timeout, in seconds, unless overridden with `with_timeout`.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Markup budget (in characters) sent with an inference request.
const INFER_MARKUP_CHARS: usize = 15_000;
/// Markup budget (in characters) sent with an improvement request.
const IMPROVE_MARKUP_CHARS: usize = 10_000;

const INFER_MAX_TOKENS: u32 = 1000;
const IMPROVE_MAX_TOKENS: u32 = 100;
const JUDGE_MAX_TOKENS: u32 = 150;

const INFER_SYSTEM_PROMPT: &str = r##"You analyze the HTML of e-commerce listing pages and identify CSS selectors for product records.

Rules:
- product_container must match each individual product item, never page layout such as div.container, div.wrapper or div.row. Product items usually carry classes containing "product", "item" or "card".
- A real container holds a title, a link, an image and a price in a repeated pattern.
- Field selectors are relative to the container (e.g. "h3", not "div.product h3"). Prefer class names over bare tags.
- Target the main price and the main product image, not thumbnails or badges.
- pagination_next must be a real link with a URL path or query string. Never pick href="#" or javascript: links. Use null when unsure.
- Use null for any element you cannot identify confidently.

Respond with a JSON object:
{"product_container": "...", "product_title": "...", "product_url": "...", "product_image": "...", "product_price": "...", "pagination_next": "..."}"##;

/// OpenAI-compatible oracle that infers, improves and judges rule sets.
///
/// Works with any OpenAI-compatible API, including:
/// - OpenAI directly (`https://api.openai.com/v1`)
/// - Gemini via compatibility layer (`https://generativelanguage.googleapis.com/v1beta/openai`)
#[derive(Clone)]
pub struct OpenAiOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiOracle {
    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(
            api_key,
            model,
            base_url,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.api_key, &self.model, &self.base_url, timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Send one chat completion in JSON mode and return the message content.
    async fn complete(
        &self,
        system: String,
        user: String,
        max_tokens: u32,
    ) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system,
                },
                Message {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            max_tokens: Some(max_tokens),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {}", e))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status_code, body));

            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }

            return Err(AppError::OracleError {
                message,
                status_code,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| {
                AppError::MalformedResponse(format!("Failed to parse oracle response: {}", e))
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::OracleError {
                message: "Empty response from oracle".into(),
                status_code: 200,
            })
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct SelectorAnswer {
    selector: Option<String>,
}

// ---- Oracle traits ----

impl SelectorOracle for OpenAiOracle {
    async fn infer(&self, probe: &ProbeReport, html: &str) -> Result<RuleSet, AppError> {
        let user = format!(
            "Page Title: {}\nURL: {}\n\nPossible Product Elements:\n{}\n\nPossible Pagination Elements:\n{}\n\nHTML Sample (truncated):\n```html\n{}\n```\n\nIdentify the CSS selectors for the product elements.",
            probe.page.title,
            probe.page.base_url,
            serde_json::to_string_pretty(&probe.containers)?,
            serde_json::to_string_pretty(&probe.pagination)?,
            truncate_chars(html, INFER_MARKUP_CHARS),
        );

        let content = self
            .complete(INFER_SYSTEM_PROMPT.to_string(), user, INFER_MAX_TOKENS)
            .await?;
        let rules = parse_rules(&content)?;
        tracing::debug!(?rules, "Oracle proposed rules");
        Ok(rules)
    }

    async fn improve(
        &self,
        html: &str,
        rules: &RuleSet,
        failing: &FieldValidation,
        _base_url: &str,
    ) -> Result<RuleSet, AppError> {
        let field = failing.field;
        let current = rules.rule(field).unwrap_or("none");
        let system = format!(
            "You improve CSS selectors for web scraping. Improve the selector for the {field} field.\n\
             Current selector: {current}\n\
             Container selector: {container}\n\n\
             Hints:\n\
             - Title: h1-h6 tags or classes containing 'title', 'name', 'product'\n\
             - URL: 'a' tags linking to product pages\n\
             - Image: 'img' tags or classes containing 'image', 'photo'\n\
             - Price: classes containing 'price', 'cost', or currency symbols\n\n\
             Respond with a JSON object: {{\"selector\": \"improved-css-selector\"}}",
            container = rules.rule(Field::Container).unwrap_or("none"),
        );
        let user = format!(
            "HTML Sample (truncated):\n```html\n{}\n```\n\nThe current selector is not working: {current}\nReason: {}\nSuggest an improved CSS selector for the {field} field, relative to the container.",
            truncate_chars(html, IMPROVE_MARKUP_CHARS),
            failing.reason,
        );

        let content = self.complete(system, user, IMPROVE_MAX_TOKENS).await?;
        let mut improved = rules.clone();
        if let Some(selector) = parse_selector_answer(&content)? {
            tracing::debug!(%field, %selector, "Oracle proposed selector");
            improved.set_rule(field, Some(selector));
        }
        Ok(improved)
    }
}

impl Judge for OpenAiOracle {
    async fn judge(
        &self,
        field: Field,
        samples: &[FieldSample],
        guidance: &str,
    ) -> Result<Verdict, AppError> {
        let name = field.label();
        let system = format!(
            "You validate web scraper output. Check whether the {name} is correctly identified.\n\
             You receive the CSS selector used, the HTML element found and the value extracted.\n\n\
             Guidelines for {name}: {guidance}\n\n\
             Respond with a JSON object: {{\"valid\": true/false, \"reason\": \"brief explanation\"}}"
        );

        let elements: Vec<serde_json::Value> = samples
            .iter()
            .map(|s| {
                serde_json::json!({
                    "selector": s.rule,
                    "html": s.snippet,
                    "extracted_value": s.value,
                })
            })
            .collect();
        let user = format!(
            "Field: {name}\n\nSample Elements:\n{}\n\nIs this field correctly identified? Consider both the selector and the extracted content.",
            serde_json::to_string_pretty(&elements)?
        );

        let content = self.complete(system, user, JUDGE_MAX_TOKENS).await?;
        parse_verdict(&content)
    }
}

// ---- Answer parsing ----

fn parse_rules(content: &str) -> Result<RuleSet, AppError> {
    serde_json::from_str(content).map_err(|e| {
        AppError::MalformedResponse(format!("Invalid rule set: {}. Raw: {}", e, content))
    })
}

fn parse_selector_answer(content: &str) -> Result<Option<String>, AppError> {
    let answer: SelectorAnswer = serde_json::from_str(content).map_err(|e| {
        AppError::MalformedResponse(format!("Invalid selector answer: {}. Raw: {}", e, content))
    })?;
    Ok(answer
        .selector
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn parse_verdict(content: &str) -> Result<Verdict, AppError> {
    serde_json::from_str(content).map_err(|e| {
        AppError::MalformedResponse(format!("Invalid verdict: {}. Raw: {}", e, content))
    })
}

/// The first `max` characters of `text`, cut on a character boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
