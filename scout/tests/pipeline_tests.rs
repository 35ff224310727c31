mod common;

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{api_error_body, completion_body, criteria_content, oracle_config};
use scout::cache::ScoreCache;
use scout::config::{Config, DatabaseConfig, DiscoveryConfig, PipelineConfig};
use scout::db::Database;
use scout::discovery::HttpDiscovery;
use scout::error::OracleFailure;
use scout::llm::{OracleApiClient, ScoringOracle, ORACLE_CHANNEL};
use scout::models::{CandidateRecord, JobProfile};
use scout::ratelimit::RateLimiter;
use scout::services::{CandidateOutcome, Pipeline, PipelineFailure, SourcingAgent};

fn limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new().channel(ORACLE_CHANNEL, 10_000))
}

fn pipeline_config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        fingerprint_algorithm: "sha256".to_string(),
        top_candidates: 10,
    }
}

fn oracle_over(server: &MockServer, max_retries: u32) -> Arc<dyn ScoringOracle> {
    let config = oracle_config(format!("{}/v1", server.uri()), max_retries);
    Arc::new(OracleApiClient::new(&config, limiter()).unwrap())
}

async fn mount_scoring_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body(&criteria_content([8.0, 7.0, 5.0, 9.0, 10.0, 6.0]))),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn batch_with_permanent_failures_yields_partial_result() {
    let server = MockServer::start().await;

    // Candidates named "Unlucky ..." hit a permanently broken oracle
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Unlucky"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream failure"))
        .mount(&server)
        .await;
    mount_scoring_success(&server).await;

    let candidates = vec![
        CandidateRecord::new("https://example.com/in/a", "Alice"),
        CandidateRecord::new("https://example.com/in/b", "Bob"),
        CandidateRecord::new("https://example.com/in/c", "Carol"),
        CandidateRecord::new("https://example.com/in/d", "Unlucky Dan"),
        CandidateRecord::new("https://example.com/in/e", "Unlucky Eve"),
    ];

    let cache = ScoreCache::new(Database::in_memory().await.unwrap());
    let pipeline = Pipeline::new(cache, oracle_over(&server, 0), pipeline_config(2));
    let job = JobProfile::parse("Senior Rust Engineer, Remote");

    let result = pipeline.run(&job, &candidates).await;

    assert_eq!(result.summary.total, 5);
    assert_eq!(result.summary.scored, 3);
    assert_eq!(result.summary.failed, 2);
    assert!((result.summary.average_score - 7.6).abs() < 1e-9);

    let dan = result.outcomes.get("https://example.com/in/d").unwrap();
    assert!(matches!(
        dan,
        CandidateOutcome::Failed {
            failure: PipelineFailure::Oracle(_)
        }
    ));
}

#[tokio::test]
async fn cache_hits_suppress_oracle_calls_on_second_run() {
    let server = MockServer::start().await;
    mount_scoring_success(&server).await;

    let candidates = vec![
        CandidateRecord::new("https://example.com/in/a", "Alice"),
        CandidateRecord::new("https://example.com/in/b", "Bob"),
    ];

    let cache = ScoreCache::new(Database::in_memory().await.unwrap());
    let oracle = oracle_over(&server, 0);
    let pipeline = Pipeline::new(cache, oracle, pipeline_config(2));
    let job = JobProfile::parse("Senior Rust Engineer, Remote");

    let first = pipeline.run(&job, &candidates).await;
    assert_eq!(first.summary.scored, 2);
    assert_eq!(first.summary.from_cache, 0);

    let second = pipeline.run(&job, &candidates).await;
    assert_eq!(second.summary.scored, 2);
    assert_eq!(second.summary.from_cache, 2);

    // Two candidates scored once each; the second run never hit the wire
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn unauthorized_fast_fails_the_rest_of_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(api_error_body(
            "Invalid API key",
            "invalid_request_error",
            "invalid_api_key",
        )))
        .mount(&server)
        .await;

    let candidates: Vec<CandidateRecord> = (0..4)
        .map(|i| CandidateRecord::new(format!("https://example.com/in/c{i}"), format!("C{i}")))
        .collect();

    let cache = ScoreCache::new(Database::in_memory().await.unwrap());
    // One worker: the first candidate trips the flag before the rest start
    let pipeline = Pipeline::new(cache, oracle_over(&server, 3), pipeline_config(1));
    let job = JobProfile::parse("Senior Rust Engineer, Remote");

    let result = pipeline.run(&job, &candidates).await;

    assert_eq!(result.summary.failed, 4);
    assert!(result.outcomes.values().all(|outcome| matches!(
        outcome,
        CandidateOutcome::Failed {
            failure: PipelineFailure::Oracle(OracleFailure::Unauthorized(_))
        }
    )));

    // Only the first candidate ever reached the oracle
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn agent_end_to_end_discovers_scores_and_drafts_outreach() {
    let oracle_server = MockServer::start().await;
    let discovery_server = MockServer::start().await;

    // Outreach prompts are matched first; everything else is a scoring call
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("outreach message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "Hi there, your experience stood out. Open to a quick chat?",
        )))
        .mount(&oracle_server)
        .await;
    mount_scoring_success(&oracle_server).await;

    Mock::given(method("POST"))
        .and(path("/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {
                    "full_name": "Jane Doe",
                    "linkedin_url": "https://www.linkedin.com/in/jane-doe",
                    "headline": "Staff Engineer at Acme",
                    "company": "Acme"
                },
                {
                    "full_name": "John Roe",
                    "linkedin_url": "https://www.linkedin.com/in/john-roe",
                    "headline": "Platform Engineer"
                },
                {
                    "full_name": "Bad Record",
                    "linkedin_url": ""
                }
            ]
        })))
        .expect(1)
        .mount(&discovery_server)
        .await;

    let shared_limiter = Arc::new(
        RateLimiter::new()
            .channel(ORACLE_CHANNEL, 10_000)
            .channel(scout::discovery::SEARCH_CHANNEL, 10_000),
    );

    let config = Config {
        database: DatabaseConfig {
            url: ":memory:".to_string(),
            auth_token: None,
            local_path: None,
        },
        oracle: oracle_config(format!("{}/v1", oracle_server.uri()), 0),
        discovery: DiscoveryConfig {
            base_url: format!("{}/profiles", discovery_server.uri()),
            api_key: None,
            timeout_secs: 5,
            result_limit: 10,
            rate_limit_per_minute: 10_000,
            cache_max_age_hours: 24,
        },
        pipeline: PipelineConfig {
            workers: 2,
            fingerprint_algorithm: "sha256".to_string(),
            top_candidates: 1,
        },
    };

    let db = Database::new(&config.database).await.unwrap();
    let oracle = Arc::new(
        OracleApiClient::new(&config.oracle, Arc::clone(&shared_limiter)).unwrap(),
    );
    let discovery = Arc::new(
        HttpDiscovery::new(config.discovery.clone(), Arc::clone(&shared_limiter)).unwrap(),
    );

    let agent = SourcingAgent::new(db, discovery, oracle, config);
    let report = agent
        .process_job("Senior Rust Engineer, Remote", false)
        .await
        .unwrap();

    // The record without a profile URL was dropped at discovery
    assert_eq!(report.summary.total_candidates, 2);
    assert_eq!(report.summary.scored, 2);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.outreach_count, 1);
    assert!(report.error.is_none());

    assert_eq!(report.candidates.len(), 2);
    assert_eq!(report.candidates[0].score, 7.6);
    assert_eq!(
        report.candidates[0].outreach_message.as_deref(),
        Some("Hi there, your experience stood out. Open to a quick chat?")
    );
    assert!(report.candidates[1].outreach_message.is_none());

    // A second run over the same job reuses the discovery cache (expect(1))
    // and serves every score from the cache.
    let second = agent
        .process_job("Senior Rust Engineer, Remote", false)
        .await
        .unwrap();
    assert_eq!(second.summary.from_cache, 2);
}
