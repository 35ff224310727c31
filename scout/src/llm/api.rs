use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};

use crate::config::{parse_oracle_provider_model, OracleConfig};
use crate::error::{OracleFailure, Result, ScoutError};
use crate::llm::backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::llm::prompts;
use crate::llm::provider::OracleBackend;
use crate::llm::{ScoringOracle, ORACLE_CHANNEL};
use crate::models::score::{Criterion, CriterionScore};
use crate::models::{CandidateRecord, JobProfile, ScoreBreakdown};
use crate::ratelimit::RateLimiter;

#[derive(Debug, Clone)]
struct ApiConfig {
    base_url: String,
    model: String,
}

/// Client for the remote scoring oracle.
///
/// Every attempt acquires admission on the "oracle" rate-limit channel
/// first; transient failures are retried per the [`BackoffPolicy`], and
/// `Unauthorized` is returned immediately without retry. Cancellation is
/// observed before each backoff sleep; an in-flight request runs to
/// completion.
#[derive(Clone)]
pub struct OracleApiClient {
    client: Client<OpenAIConfig>,
    config: ApiConfig,
    policy: BackoffPolicy,
    limiter: Arc<RateLimiter>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl OracleApiClient {
    pub fn new(config: &OracleConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let backend = OracleBackend::detect(config);

        let base_url = match backend.default_base_url() {
            Some(default) => config.base_url.clone().unwrap_or_else(|| default.to_string()),
            None => {
                let OracleBackend::Unavailable { reason } = &backend else {
                    unreachable!("backend without base url is always Unavailable");
                };
                return Err(ScoutError::OracleUnavailable(reason.clone()));
            }
        };

        if backend.requires_api_key() && config.api_key.is_none() {
            return Err(ScoutError::Validation(
                "ORACLE_API_KEY is required for this oracle provider".to_string(),
            ));
        }

        let (_, model) = parse_oracle_provider_model(&config.model);

        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url.clone())
            .with_api_key(config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                ScoutError::OracleUnavailable(format!("Failed to create oracle HTTP client: {error}"))
            })?;

        // Bound async-openai's internal backoff to our request timeout so it
        // does not retry 500s on its own for its default 15 minutes on top
        // of our retry loop.
        let transport_backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(transport_backoff);

        Ok(Self {
            client,
            config: ApiConfig {
                base_url,
                model: model.to_string(),
            },
            policy: BackoffPolicy::from_config(config),
            limiter,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Replace the sleeper (tests assert on backoff without real delays).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attach a batch-level cancellation token. A cancellation observed
    /// during a backoff sleep abandons the remaining retries and returns
    /// the last failure.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn complete_with_retries<T>(
        &self,
        prompt: &str,
        temperature: f32,
        parse: impl Fn(String) -> std::result::Result<T, OracleFailure>,
    ) -> std::result::Result<T, OracleFailure> {
        let request = self.build_request(prompt, temperature)?;
        let mut last_failure: Option<OracleFailure> = None;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt);
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        tracing::debug!(attempt, "oracle retry abandoned: batch cancelled");
                        return Err(last_failure.expect("cancelled before any attempt failed"));
                    }
                    _ = self.sleeper.sleep(delay) => {}
                }
            }

            self.limiter.acquire(ORACLE_CHANNEL).await;

            let failure = match self.client.chat().create(request.clone()).await {
                Ok(response) => match Self::extract_content(response).and_then(&parse) {
                    Ok(value) => return Ok(value),
                    Err(failure) => failure,
                },
                Err(error) => Self::classify(error),
            };

            if !failure.is_transient() || attempt == self.policy.max_retries {
                return Err(failure);
            }

            tracing::warn!(attempt, error = %failure, "oracle attempt failed, will retry");
            last_failure = Some(failure);
        }

        Err(last_failure.expect("retry loop always records a failure"))
    }

    fn build_request(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> std::result::Result<CreateChatCompletionRequest, OracleFailure> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|error| OracleFailure::InvalidResponse(format!("invalid prompt: {error}")))?;

        CreateChatCompletionRequestArgs::default()
            .model(self.config.model.clone())
            .messages(vec![message.into()])
            .temperature(temperature)
            .build()
            .map_err(|error| OracleFailure::InvalidResponse(format!("invalid request: {error}")))
    }

    fn extract_content(
        response: CreateChatCompletionResponse,
    ) -> std::result::Result<String, OracleFailure> {
        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                OracleFailure::InvalidResponse("response contained no choices".to_string())
            })?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(OracleFailure::InvalidResponse(
                "response contained empty content".to_string(),
            ));
        }
        Ok(content)
    }

    fn classify(error: OpenAIError) -> OracleFailure {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
                    OracleFailure::RateLimited { retry_after: None }
                } else if matches!(
                    reqwest_error.status(),
                    Some(reqwest::StatusCode::UNAUTHORIZED) | Some(reqwest::StatusCode::FORBIDDEN)
                ) {
                    OracleFailure::Unauthorized(reqwest_error.to_string())
                } else if reqwest_error.is_timeout() {
                    OracleFailure::Timeout(format!("request timed out: {reqwest_error}"))
                } else {
                    OracleFailure::Timeout(format!("transport error: {reqwest_error}"))
                }
            }
            OpenAIError::ApiError(api_error) => {
                if Self::is_rate_limit_api_error(&api_error) {
                    OracleFailure::RateLimited { retry_after: None }
                } else if Self::is_auth_api_error(&api_error) {
                    OracleFailure::Unauthorized(api_error.to_string())
                } else {
                    OracleFailure::InvalidResponse(format!("oracle API error: {api_error}"))
                }
            }
            OpenAIError::JSONDeserialize(err) => {
                OracleFailure::InvalidResponse(format!("unparseable response body: {err}"))
            }
            other => OracleFailure::InvalidResponse(other.to_string()),
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("authentication")
            || message.contains("invalid api key")
            || code.contains("invalid_api_key")
            || code.contains("authentication")
            || error_type.contains("authentication")
    }
}

/// Parse the oracle's `{"criteria": [...]}` body into criterion scores.
///
/// A body without a `criteria` array fails schema validation (and is
/// retried upstream). Individual items with unknown names or non-numeric
/// values are dropped with a warning; the scorer neutral-fills whatever
/// is missing.
fn parse_criteria(content: String) -> std::result::Result<Vec<CriterionScore>, OracleFailure> {
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        OracleFailure::InvalidResponse(format!("oracle returned non-JSON content: {e}"))
    })?;

    let items = value
        .get("criteria")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            OracleFailure::InvalidResponse("response has no 'criteria' array".to_string())
        })?;

    let mut scores = Vec::with_capacity(items.len());
    for item in items {
        let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
        let Some(criterion) = Criterion::parse(name) else {
            tracing::warn!(name, "skipping unknown criterion in oracle response");
            continue;
        };
        let Some(raw_value) = item.get("value").and_then(Value::as_f64) else {
            tracing::warn!(
                criterion = criterion.as_str(),
                "skipping criterion with non-numeric value"
            );
            continue;
        };
        let rationale = item
            .get("rationale")
            .and_then(Value::as_str)
            .map(String::from);

        scores.push(CriterionScore {
            criterion,
            value: raw_value,
            rationale,
        });
    }

    Ok(scores)
}

#[async_trait]
impl ScoringOracle for OracleApiClient {
    async fn score(
        &self,
        job: &JobProfile,
        candidate: &CandidateRecord,
    ) -> std::result::Result<Vec<CriterionScore>, OracleFailure> {
        let prompt = prompts::scoring_prompt(job, candidate);
        self.complete_with_retries(&prompt, 0.3, parse_criteria)
            .await
    }

    async fn draft_outreach(
        &self,
        job: &JobProfile,
        candidate: &CandidateRecord,
        breakdown: &ScoreBreakdown,
    ) -> std::result::Result<String, OracleFailure> {
        let prompt = prompts::outreach_prompt(job, candidate, breakdown);
        self.complete_with_retries(&prompt, 0.7, |content| {
            let message = content.trim().to_string();
            if message.is_empty() {
                Err(OracleFailure::InvalidResponse(
                    "empty outreach message".to_string(),
                ))
            } else {
                Ok(message)
            }
        })
        .await
    }
}
