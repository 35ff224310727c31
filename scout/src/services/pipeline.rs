//! Per-candidate scoring pipeline.
//!
//! Each candidate walks the same state machine: fingerprint → cache check →
//! (on miss) oracle call → compose → write-through. A bounded worker pool
//! drains the batch; individual failures are recorded, never propagated.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{fingerprint_for, CacheEntry, ScoreCache};
use crate::config::PipelineConfig;
use crate::error::OracleFailure;
use crate::llm::ScoringOracle;
use crate::models::{CandidateRecord, JobProfile, ScoreBreakdown};
use crate::scoring;

/// Why one candidate could not be scored. Recorded in the batch result;
/// never aborts the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineFailure {
    Oracle(OracleFailure),
    Validation(String),
    Cancelled,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineFailure::Oracle(failure) => write!(f, "{failure}"),
            PipelineFailure::Validation(msg) => write!(f, "validation error: {msg}"),
            PipelineFailure::Cancelled => write!(f, "batch cancelled before scoring"),
        }
    }
}

/// Terminal state of one candidate's walk through the pipeline.
#[derive(Debug, Clone)]
pub enum CandidateOutcome {
    Scored {
        breakdown: ScoreBreakdown,
        from_cache: bool,
    },
    Failed {
        failure: PipelineFailure,
    },
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    pub from_cache: usize,
    pub average_score: f64,
}

/// Aggregated result of one batch run. Outcomes are keyed by candidate
/// identity, so aggregation order does not depend on completion order.
#[derive(Debug)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub outcomes: HashMap<String, CandidateOutcome>,
    pub summary: BatchSummary,
}

impl BatchResult {
    fn from_outcomes(run_id: Uuid, outcomes: HashMap<String, CandidateOutcome>) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        let mut score_sum = 0.0;

        for outcome in outcomes.values() {
            match outcome {
                CandidateOutcome::Scored {
                    breakdown,
                    from_cache,
                } => {
                    summary.scored += 1;
                    score_sum += breakdown.composite;
                    if *from_cache {
                        summary.from_cache += 1;
                    }
                }
                CandidateOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        if summary.scored > 0 {
            summary.average_score = score_sum / summary.scored as f64;
        }

        Self {
            run_id,
            outcomes,
            summary,
        }
    }
}

pub struct Pipeline {
    cache: ScoreCache,
    oracle: Arc<dyn ScoringOracle>,
    config: PipelineConfig,
    cancel: CancellationToken,
    recompute: bool,
}

impl Pipeline {
    pub fn new(cache: ScoreCache, oracle: Arc<dyn ScoringOracle>, config: PipelineConfig) -> Self {
        Self {
            cache,
            oracle,
            config,
            cancel: CancellationToken::new(),
            recompute: false,
        }
    }

    /// Wire in a batch-level cancellation token. Workers observe it before
    /// starting oracle work; in-flight calls complete and are discarded.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bypass cache reads and overwrite entries with fresh results.
    pub fn with_recompute(mut self, recompute: bool) -> Self {
        self.recompute = recompute;
        self
    }

    /// Score a batch of candidates against one job.
    ///
    /// A batch with zero successes is a valid (all-failed) result; this
    /// method never fails as a whole. The first `Unauthorized` oracle
    /// failure fast-fails every candidate that has not yet reached the
    /// oracle, since the credential will not get better mid-batch.
    pub async fn run(&self, job: &JobProfile, candidates: &[CandidateRecord]) -> BatchResult {
        let run_id = Uuid::new_v4();
        let unauthorized: Arc<OnceLock<OracleFailure>> = Arc::new(OnceLock::new());

        tracing::info!(
            %run_id,
            candidates = candidates.len(),
            workers = self.config.workers,
            "starting scoring batch"
        );

        let outcomes: HashMap<String, CandidateOutcome> = stream::iter(candidates)
            .map(|candidate| {
                let unauthorized = Arc::clone(&unauthorized);
                async move {
                    let outcome = self.process_candidate(job, candidate, &unauthorized).await;
                    (candidate.identity().to_string(), outcome)
                }
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let result = BatchResult::from_outcomes(run_id, outcomes);
        tracing::info!(
            %run_id,
            scored = result.summary.scored,
            failed = result.summary.failed,
            from_cache = result.summary.from_cache,
            "scoring batch finished"
        );
        result
    }

    async fn process_candidate(
        &self,
        job: &JobProfile,
        candidate: &CandidateRecord,
        unauthorized: &OnceLock<OracleFailure>,
    ) -> CandidateOutcome {
        if let Err(e) = candidate.validate() {
            return CandidateOutcome::Failed {
                failure: PipelineFailure::Validation(e.to_string()),
            };
        }

        let fingerprint = fingerprint_for(job, candidate);

        if !self.recompute {
            match self.cache.get(&fingerprint).await {
                Ok(Some(entry)) => {
                    tracing::debug!(candidate = candidate.identity(), %fingerprint, "cache hit");
                    return CandidateOutcome::Scored {
                        breakdown: entry.breakdown,
                        from_cache: true,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    // Read failures degrade to a recompute
                    tracing::warn!(
                        candidate = candidate.identity(),
                        error = %e,
                        "cache read failed, treating as miss"
                    );
                }
            }
        }

        if let Some(failure) = unauthorized.get() {
            return CandidateOutcome::Failed {
                failure: PipelineFailure::Oracle(failure.clone()),
            };
        }
        if self.cancel.is_cancelled() {
            return CandidateOutcome::Failed {
                failure: PipelineFailure::Cancelled,
            };
        }

        match self.oracle.score(job, candidate).await {
            Ok(raw_scores) => {
                let breakdown = scoring::build_breakdown(raw_scores);
                let entry = CacheEntry::new(fingerprint, breakdown.clone());
                if let Err(e) = self.cache.put(&entry).await {
                    // The fresh result is still returned to the caller
                    tracing::warn!(
                        candidate = candidate.identity(),
                        error = %e,
                        "cache write failed, returning uncached result"
                    );
                }
                CandidateOutcome::Scored {
                    breakdown,
                    from_cache: false,
                }
            }
            Err(failure) => {
                if matches!(failure, OracleFailure::Unauthorized(_)) {
                    // First occurrence wins; later candidates reuse it
                    let _ = unauthorized.set(failure.clone());
                }
                CandidateOutcome::Failed {
                    failure: PipelineFailure::Oracle(failure),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::score::{Criterion, CriterionScore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted oracle: fails candidates whose URL contains a marker.
    struct ScriptedOracle {
        calls: AtomicUsize,
        fail_marker: Option<String>,
        failure: OracleFailure,
    }

    impl ScriptedOracle {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_marker: None,
                failure: OracleFailure::Timeout("unused".into()),
            }
        }

        fn failing_for(marker: &str, failure: OracleFailure) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_marker: Some(marker.to_string()),
                failure,
            }
        }
    }

    #[async_trait]
    impl ScoringOracle for ScriptedOracle {
        async fn score(
            &self,
            _job: &JobProfile,
            candidate: &CandidateRecord,
        ) -> Result<Vec<CriterionScore>, OracleFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_marker {
                if candidate.profile_url.contains(marker.as_str()) {
                    return Err(self.failure.clone());
                }
            }
            Ok(Criterion::ALL
                .iter()
                .map(|c| CriterionScore::new(*c, 7.0))
                .collect())
        }

        async fn draft_outreach(
            &self,
            _job: &JobProfile,
            _candidate: &CandidateRecord,
            _breakdown: &ScoreBreakdown,
        ) -> Result<String, OracleFailure> {
            Ok("hello".to_string())
        }
    }

    fn pipeline_config(workers: usize) -> PipelineConfig {
        PipelineConfig {
            workers,
            fingerprint_algorithm: "sha256".to_string(),
            top_candidates: 10,
        }
    }

    fn candidates(n: usize) -> Vec<CandidateRecord> {
        (0..n)
            .map(|i| CandidateRecord::new(format!("https://example.com/in/c{i}"), format!("C{i}")))
            .collect()
    }

    async fn cache() -> ScoreCache {
        ScoreCache::new(Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn batch_with_partial_failures_never_aborts() {
        let oracle = Arc::new(ScriptedOracle::failing_for(
            "/c3",
            OracleFailure::Timeout("oracle down".into()),
        ));
        let mut batch = candidates(5);
        batch[4].profile_url = "https://example.com/in/c3-clone".to_string();

        let pipeline = Pipeline::new(cache().await, oracle, pipeline_config(3));
        let job = JobProfile::parse("Rust Engineer");
        let result = pipeline.run(&job, &batch).await;

        assert_eq!(result.summary.total, 5);
        assert_eq!(result.summary.scored, 3);
        assert_eq!(result.summary.failed, 2);
        assert!((result.summary.average_score - 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let oracle = Arc::new(ScriptedOracle::succeeding());
        let cache = cache().await;
        let pipeline = Pipeline::new(cache.clone(), Arc::clone(&oracle) as _, pipeline_config(2));
        let job = JobProfile::parse("Rust Engineer");
        let batch = candidates(3);

        let first = pipeline.run(&job, &batch).await;
        assert_eq!(first.summary.from_cache, 0);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);

        let second = pipeline.run(&job, &batch).await;
        assert_eq!(second.summary.scored, 3);
        assert_eq!(second.summary.from_cache, 3);
        // No additional oracle calls for cache hits
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recompute_bypasses_cache_and_overwrites() {
        let oracle = Arc::new(ScriptedOracle::succeeding());
        let cache = cache().await;
        let job = JobProfile::parse("Rust Engineer");
        let batch = candidates(2);

        Pipeline::new(cache.clone(), Arc::clone(&oracle) as _, pipeline_config(2))
            .run(&job, &batch)
            .await;

        let result = Pipeline::new(cache, Arc::clone(&oracle) as _, pipeline_config(2))
            .with_recompute(true)
            .run(&job, &batch)
            .await;

        assert_eq!(result.summary.from_cache, 0);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn unauthorized_fast_fails_remaining_candidates() {
        // Single worker makes ordering deterministic: first candidate trips
        // the flag, the rest never reach the oracle.
        let oracle = Arc::new(ScriptedOracle::failing_for(
            "/c",
            OracleFailure::Unauthorized("bad key".into()),
        ));
        let pipeline = Pipeline::new(cache().await, Arc::clone(&oracle) as _, pipeline_config(1));
        let job = JobProfile::parse("Rust Engineer");
        let result = pipeline.run(&job, &candidates(4)).await;

        assert_eq!(result.summary.failed, 4);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert!(result.outcomes.values().all(|outcome| matches!(
            outcome,
            CandidateOutcome::Failed {
                failure: PipelineFailure::Oracle(OracleFailure::Unauthorized(_))
            }
        )));
    }

    #[tokio::test]
    async fn cancelled_batch_stops_new_oracle_work() {
        let oracle = Arc::new(ScriptedOracle::succeeding());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let pipeline = Pipeline::new(cache().await, Arc::clone(&oracle) as _, pipeline_config(2))
            .with_cancellation(cancel);
        let job = JobProfile::parse("Rust Engineer");
        let result = pipeline.run(&job, &candidates(3)).await;

        assert_eq!(result.summary.failed, 3);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        assert!(result.outcomes.values().all(|outcome| matches!(
            outcome,
            CandidateOutcome::Failed {
                failure: PipelineFailure::Cancelled
            }
        )));
    }

    #[tokio::test]
    async fn invalid_candidate_fails_without_oracle_call() {
        let oracle = Arc::new(ScriptedOracle::succeeding());
        let pipeline = Pipeline::new(cache().await, Arc::clone(&oracle) as _, pipeline_config(2));
        let job = JobProfile::parse("Rust Engineer");

        let invalid = vec![CandidateRecord::new("not-a-url", "Nobody")];
        let result = pipeline.run(&job, &invalid).await;

        assert_eq!(result.summary.failed, 1);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            result.outcomes.values().next().unwrap(),
            CandidateOutcome::Failed {
                failure: PipelineFailure::Validation(_)
            }
        ));
    }

    #[tokio::test]
    async fn cached_breakdown_equals_cold_recompute() {
        let oracle = Arc::new(ScriptedOracle::succeeding());
        let cache = cache().await;
        let pipeline = Pipeline::new(cache, Arc::clone(&oracle) as _, pipeline_config(1));
        let job = JobProfile::parse("Rust Engineer");
        let batch = candidates(1);

        let cold = pipeline.run(&job, &batch).await;
        let warm = pipeline.run(&job, &batch).await;

        let cold_breakdown = match cold.outcomes.values().next().unwrap() {
            CandidateOutcome::Scored { breakdown, .. } => breakdown.clone(),
            other => panic!("expected scored outcome, got {other:?}"),
        };
        let warm_breakdown = match warm.outcomes.values().next().unwrap() {
            CandidateOutcome::Scored { breakdown, .. } => breakdown.clone(),
            other => panic!("expected scored outcome, got {other:?}"),
        };
        assert_eq!(cold_breakdown, warm_breakdown);
    }
}
