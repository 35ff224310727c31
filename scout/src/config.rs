use serde::Deserialize;
use std::env;

use crate::error::{Result, ScoutError};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub oracle: OracleConfig,
    pub discovery: DiscoveryConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

/// Scoring oracle configuration (OpenAI-compatible chat-completion service).
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// `provider/model`, e.g. `groq/llama-3.3-70b-versatile`.
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Base delay for the first retry, doubled per attempt.
    pub backoff_base_ms: u64,
    /// Upper bound on any single retry delay.
    pub backoff_cap_ms: u64,
    /// Admissions per minute on the "oracle" rate-limit channel.
    pub rate_limit_per_minute: u32,
}

/// Profile discovery configuration (external search API).
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub result_limit: usize,
    /// Admissions per minute on the "search" rate-limit channel.
    pub rate_limit_per_minute: u32,
    /// Cached search results older than this are re-fetched.
    pub cache_max_age_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Bounded worker-pool size for candidate fan-out.
    pub workers: usize,
    /// Cache fingerprint digest; only "sha256" is supported.
    pub fingerprint_algorithm: String,
    /// How many top-ranked candidates get an outreach message.
    pub top_candidates: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:scout.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            oracle: OracleConfig {
                model: env::var("ORACLE_MODEL")
                    .unwrap_or_else(|_| "groq/llama-3.3-70b-versatile".to_string()),
                api_key: env::var("ORACLE_API_KEY")
                    .ok()
                    .or_else(|| env::var("GROQ_API_KEY").ok()),
                base_url: env::var("ORACLE_BASE_URL").ok(),
                timeout_secs: parse_env_or("ORACLE_TIMEOUT", 30),
                max_retries: parse_env_or("ORACLE_MAX_RETRIES", 3),
                backoff_base_ms: parse_env_or("ORACLE_BACKOFF_BASE_MS", 100),
                backoff_cap_ms: parse_env_or("ORACLE_BACKOFF_CAP_MS", 10_000),
                rate_limit_per_minute: parse_env_or("ORACLE_RATE_LIMIT", 60),
            },
            discovery: DiscoveryConfig {
                base_url: env::var("DISCOVERY_BASE_URL").unwrap_or_else(|_| {
                    "https://fresh-linkedin-profile-data.p.rapidapi.com/google-full-profiles"
                        .to_string()
                }),
                api_key: env::var("DISCOVERY_API_KEY").ok(),
                timeout_secs: parse_env_or("DISCOVERY_TIMEOUT", 30),
                result_limit: parse_env_or("DISCOVERY_RESULT_LIMIT", 10),
                rate_limit_per_minute: parse_env_or("DISCOVERY_RATE_LIMIT", 10),
                cache_max_age_hours: parse_env_or("SEARCH_CACHE_MAX_AGE_HOURS", 24),
            },
            pipeline: PipelineConfig {
                workers: parse_env_or("PIPELINE_WORKERS", 5),
                fingerprint_algorithm: env::var("FINGERPRINT_ALGORITHM")
                    .unwrap_or_else(|_| "sha256".to_string()),
                top_candidates: parse_env_or("TOP_CANDIDATES", 10),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.fingerprint_algorithm != "sha256" {
            return Err(ScoutError::Validation(format!(
                "Unsupported fingerprint algorithm '{}', only 'sha256' is supported",
                self.pipeline.fingerprint_algorithm
            )));
        }
        if self.pipeline.workers == 0 {
            return Err(ScoutError::Validation(
                "PIPELINE_WORKERS must be at least 1".to_string(),
            ));
        }
        if self.oracle.max_retries > 10 {
            return Err(ScoutError::Validation(format!(
                "ORACLE_MAX_RETRIES={} is unreasonably high (max 10)",
                self.oracle.max_retries
            )));
        }
        Ok(())
    }
}

/// Known oracle providers that expose OpenAI-compatible APIs.
pub const KNOWN_ORACLE_PROVIDERS: &[&str] = &["groq", "openai", "openrouter", "ollama"];

/// Parse an oracle model name into a (provider, model) tuple.
pub fn parse_oracle_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_ORACLE_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Unprefixed names are sent verbatim to a custom base URL
    ("custom", model)
}
