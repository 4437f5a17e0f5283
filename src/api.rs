//! LLM analysis client with exponential backoff retry logic.
//!
//! This module is the only place that talks to the OpenAI-compatible chat
//! completion API. Both the batch job and on-demand analysis call
//! [`AnalysisClient::analyse`], which never fails: callers always receive a
//! well-shaped [`AnalysisResult`], degraded to [`AnalysisResult::fallback`]
//! when the model could not be reached or never honoured the JSON contract.
//!
//! # Architecture
//!
//! The module uses a trait-based design so each concern can be swapped out:
//! - [`AskAsync`]: Core trait defining one async request/response exchange
//! - [`OpenAiChat`]: Sends a [`ChatRequest`] over HTTP and returns a [`Completion`]
//! - [`ContractAsk`]: Decorator that parses a completion into an [`AnalysisResult`]
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//! - [`Clock`]: Sleeps between attempts; tests inject a recording clock
//!
//! # Retry Strategy
//!
//! - 3 attempts in total
//! - Exponential backoff between attempts starting at 2 seconds (2s, 4s)
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to spread out concurrent retries
//!
//! A transport error, a non-success HTTP status, a non-JSON body and a JSON
//! body that does not match the contract all count as a failed attempt.

use crate::error::{Error, Result};
use crate::models::{AnalysisResult, ArticleInput, REQUIRED_SECTIONS};
use crate::prompt::build_system_prompt;
use crate::utils::{looks_truncated, strip_code_fence, truncate_for_log};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Sampling temperature for analysis calls; low to keep the output format stable.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;

/// Trait for one async exchange with the model.
///
/// Implementors receive a fully built [`ChatRequest`] and return some
/// response. Decorators such as [`RetryAsk`] wrap another implementor.
pub trait AskAsync {
    /// The type of response returned.
    type Response;

    /// Send the request and receive a response.
    async fn ask(&self, request: &ChatRequest) -> Result<Self::Response>;
}

/// Something that can wait between attempts.
pub trait Clock {
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of a `POST /chat/completions` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl ChatRequest {
    /// Build the analysis request for one article.
    ///
    /// The system turn is the rendered prompt; the user turn is the article
    /// serialized as `{"title": ..., "summary": ...}` with non-ASCII kept as is.
    pub fn for_article(
        article: &ArticleInput<'_>,
        model_id: &str,
        max_words: u32,
        max_tokens: u32,
    ) -> Result<Self> {
        Ok(Self {
            model: model_id.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(max_words),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: serde_json::to_string(article)?,
                },
            ],
            max_tokens,
            temperature: ANALYSIS_TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        })
    }
}

/// Text and usage returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub total_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// OpenAI-compatible chat completion backend.
///
/// Constructed once at startup and handed to [`AnalysisClient::new`]; the
/// underlying `reqwest::Client` pools connections across calls.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiChat {
    /// Create a backend for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// `timeout` bounds every request end to end.
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AskAsync for OpenAiChat {
    type Response = Completion;

    #[instrument(level = "info", skip_all, fields(model = %request.model))]
    async fn ask(&self, request: &ChatRequest) -> Result<Completion> {
        let t0 = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "{status}: {}",
                truncate_for_log(&body, 300)
            )));
        }

        let body: ChatResponse = response.json().await?;
        let total_tokens = body.usage.map(|u| u.total_tokens).unwrap_or(0);
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Upstream("completion has no message content".to_string()))?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            total_tokens,
            bytes = content.len(),
            "Chat completion received"
        );
        Ok(Completion {
            content,
            total_tokens,
        })
    }
}

/// Parse a completion body into an [`AnalysisResult`], enforcing the contract.
///
/// The body must be a JSON object (optionally wrapped in a Markdown code
/// fence) containing every key in [`REQUIRED_SECTIONS`]. Unknown keys are
/// ignored and nested keys may be missing, but wrongly typed values and
/// quality scores above 100 are rejected.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(raw))?;
    let Some(object) = value.as_object() else {
        return Err(Error::Contract("response is not a JSON object".to_string()));
    };

    let missing: Vec<&str> = REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Contract(format!("missing keys: {}", missing.join(", "))));
    }

    let result: AnalysisResult = serde_json::from_value(value)?;
    if let Some(scores) = &result.quality_scores {
        if scores.all().iter().flatten().any(|&score| score > 100) {
            return Err(Error::Contract("quality score above 100".to_string()));
        }
    }
    Ok(result)
}

/// Decorator that turns a raw completion into a validated [`AnalysisResult`].
///
/// Parse and contract failures surface as errors so that [`RetryAsk`] treats
/// them exactly like transport failures.
#[derive(Debug)]
pub struct ContractAsk<T> {
    inner: T,
}

impl<T> ContractAsk<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T> AskAsync for ContractAsk<T>
where
    T: AskAsync<Response = Completion>,
{
    type Response = AnalysisResult;

    async fn ask(&self, request: &ChatRequest) -> Result<AnalysisResult> {
        let completion = self.inner.ask(request).await?;
        match parse_analysis(&completion.content) {
            Ok(mut result) => {
                result.tokens = completion.total_tokens;
                Ok(result)
            }
            Err(e) => {
                let truncated = matches!(&e, Error::Serialization(je) if looks_truncated(je));
                warn!(
                    error = %e,
                    truncated,
                    response_preview = %truncate_for_log(&completion.content, 300),
                    "Model returned non-conforming JSON"
                );
                Err(e)
            }
        }
    }
}

/// Retry schedule.
///
/// The delay after failed attempt `n` (1-based) is
/// ```text
/// delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
///
/// No delay follows the final attempt, so the default schedule waits at most
/// 2 s and then 4 s (plus jitter) before giving up.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    /// Delay after the first failed attempt (doubles with each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap to prevent excessive waiting.
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl Backoff {
    /// Backoff without jitter, so the schedule is exactly 2s, 4s, ...
    pub fn deterministic() -> Self {
        Self {
            max_jitter: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// After the last attempt the final error is returned to the caller.
pub struct RetryAsk<T, C> {
    /// The underlying client to wrap.
    inner: T,
    /// Sleeps between attempts.
    clock: C,
    backoff: Backoff,
}

impl<T, C> RetryAsk<T, C>
where
    T: AskAsync,
    C: Clock,
{
    pub fn new(inner: T, clock: C, backoff: Backoff) -> Self {
        Self {
            inner,
            clock,
            backoff,
        }
    }
}

impl<T, C> fmt::Debug for RetryAsk<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<T, C> AskAsync for RetryAsk<T, C>
where
    T: AskAsync,
    C: Clock,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, request: &ChatRequest) -> Result<Self::Response> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.inner.ask(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt >= self.backoff.max_attempts {
                        error!(
                            attempt,
                            max = self.backoff.max_attempts,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff.delay(attempt);
                    warn!(
                        attempt,
                        max = self.backoff.max_attempts,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }
    }
}

/// The analysis entry point used by the batch job and on-demand analysis.
pub struct AnalysisClient<B, C = TokioClock> {
    inner: RetryAsk<ContractAsk<B>, C>,
}

impl<B> AnalysisClient<B, TokioClock>
where
    B: AskAsync<Response = Completion>,
{
    /// Client with real sleeping and the default backoff.
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, TokioClock, Backoff::default())
    }
}

impl<B, C> AnalysisClient<B, C>
where
    B: AskAsync<Response = Completion>,
    C: Clock,
{
    pub fn with_clock(backend: B, clock: C, backoff: Backoff) -> Self {
        Self {
            inner: RetryAsk::new(ContractAsk::new(backend), clock, backoff),
        }
    }

    /// Analyse one article.
    ///
    /// Builds the system prompt for `max_words`, asks `model_id` with at most
    /// `max_tokens` output tokens, and returns the parsed result with the
    /// provider's token total attached. When every attempt fails the
    /// all-null [`AnalysisResult::fallback`] (with `tokens == 0`) is returned
    /// instead; this function never fails.
    #[instrument(level = "info", skip_all, fields(model = %model_id, max_words, max_tokens))]
    pub async fn analyse(
        &self,
        article: ArticleInput<'_>,
        model_id: &str,
        max_words: u32,
        max_tokens: u32,
    ) -> AnalysisResult {
        let t0 = Instant::now();
        let request = match ChatRequest::for_article(&article, model_id, max_words, max_tokens) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Could not build analysis request; using fallback");
                return AnalysisResult::fallback();
            }
        };

        match self.inner.ask(&request).await {
            Ok(result) => {
                info!(
                    elapsed_ms_total = t0.elapsed().as_millis() as u64,
                    tokens = result.tokens,
                    "Analysis succeeded"
                );
                result
            }
            Err(e) => {
                error!(
                    elapsed_ms_total = t0.elapsed().as_millis() as u64,
                    error = %e,
                    "Analysis failed; using fallback"
                );
                AnalysisResult::fallback()
            }
        }
    }
}
