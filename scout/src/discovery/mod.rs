//! Profile discovery: turns a job profile into a list of public candidate
//! records via an external search API. The scoring pipeline never calls
//! back into discovery; it consumes whatever this module found.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::DiscoveryConfig;
use crate::error::{Result, ScoutError};
use crate::models::{CandidateRecord, JobProfile};
use crate::ratelimit::RateLimiter;

/// Rate-limit channel used for all discovery searches.
pub const SEARCH_CHANNEL: &str = "search";

/// Keywords payloads are truncated to this length (API limit).
const MAX_KEYWORDS_LEN: usize = 120;

#[async_trait]
pub trait CandidateDiscovery: Send + Sync {
    /// Search for public profiles matching the job.
    async fn search(&self, job: &JobProfile) -> Result<Vec<CandidateRecord>>;
}

/// Discovery against an HTTP profile-search API (api-key authenticated,
/// JSON in/out). One POST per search, rate-limited on the "search" channel.
pub struct HttpDiscovery {
    http: reqwest::Client,
    config: DiscoveryConfig,
    limiter: Arc<RateLimiter>,
}

impl HttpDiscovery {
    pub fn new(config: DiscoveryConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScoutError::Discovery(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    fn build_payload(&self, job: &JobProfile) -> Value {
        let keywords: String = job.description.chars().take(MAX_KEYWORDS_LEN).collect();

        json!({
            "job_title": job.title,
            "location": job.location.as_deref().unwrap_or(""),
            "keywords": keywords,
            "limit": self.config.result_limit,
        })
    }
}

/// Parse the search API's `{"data": [...]}` body, dropping records that
/// fail profile-URL validation.
fn parse_profiles(body: &Value, limit: usize) -> Vec<CandidateRecord> {
    let Some(items) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for item in items {
        let url = item
            .get("linkedin_url")
            .or_else(|| item.get("profile_url"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let name = item
            .get("full_name")
            .or_else(|| item.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut record = CandidateRecord::new(url, name);
        record.headline = item.get("headline").and_then(Value::as_str).map(String::from);
        record.location = item.get("location").and_then(Value::as_str).map(String::from);
        record.current_company = item.get("company").and_then(Value::as_str).map(String::from);
        record.job_title = item.get("job_title").and_then(Value::as_str).map(String::from);

        match record.validate() {
            Ok(()) => records.push(record),
            Err(e) => {
                tracing::debug!(url, error = %e, "dropping search result with invalid profile");
            }
        }

        if records.len() >= limit {
            break;
        }
    }
    records
}

#[async_trait]
impl CandidateDiscovery for HttpDiscovery {
    async fn search(&self, job: &JobProfile) -> Result<Vec<CandidateRecord>> {
        self.limiter.acquire(SEARCH_CHANNEL).await;

        let mut request = self
            .http
            .post(&self.config.base_url)
            .json(&self.build_payload(job));
        if let Some(api_key) = &self.config.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoutError::Discovery(format!(
                "search API returned {status}: {body}"
            )));
        }

        let body: Value = response.json().await?;
        let profiles = parse_profiles(&body, self.config.result_limit);
        tracing::info!(count = profiles.len(), title = %job.title, "discovery search complete");
        Ok(profiles)
    }
}
