use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cache::{compute_fingerprint, ScoreCache};
use crate::config::Config;
use crate::db::repository::{CandidatesRepository, SearchCacheRepository};
use crate::db::Database;
use crate::discovery::CandidateDiscovery;
use crate::error::Result;
use crate::llm::ScoringOracle;
use crate::models::{CandidateRecord, JobProfile, ScoreBreakdown};
use crate::services::outreach::OutreachService;
use crate::services::pipeline::{CandidateOutcome, Pipeline};
use crate::services::ScoredCandidate;

/// End-to-end sourcing flow for one job description:
/// discover (cache-first) → score batch → rank → outreach for the top N.
pub struct SourcingAgent {
    db: Database,
    cache: ScoreCache,
    discovery: Arc<dyn CandidateDiscovery>,
    oracle: Arc<dyn ScoringOracle>,
    config: Config,
    cancel: CancellationToken,
}

/// One scored candidate in the report, ranked best-first.
#[derive(Debug, Clone, Serialize)]
pub struct ReportCandidate {
    pub name: String,
    pub profile_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outreach_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportFailure {
    pub profile_url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub total_candidates: usize,
    pub scored: usize,
    pub failed: usize,
    pub from_cache: usize,
    pub average_score: f64,
    pub outreach_count: usize,
}

/// Full result of processing one job description. The CLI serializes this
/// verbatim; the agent itself never prints.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_title: String,
    pub job_identity: String,
    pub summary: ReportSummary,
    pub candidates: Vec<ReportCandidate>,
    pub failures: Vec<ReportFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobReport {
    fn empty(job: &JobProfile, error: &str) -> Self {
        Self {
            job_title: job.title.clone(),
            job_identity: job.identity(),
            summary: ReportSummary::default(),
            candidates: Vec::new(),
            failures: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

impl SourcingAgent {
    pub fn new(
        db: Database,
        discovery: Arc<dyn CandidateDiscovery>,
        oracle: Arc<dyn ScoringOracle>,
        config: Config,
    ) -> Self {
        let cache = ScoreCache::new(db.clone());
        Self {
            db,
            cache,
            discovery,
            oracle,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process one job description end to end.
    pub async fn process_job(&self, description: &str, recompute: bool) -> Result<JobReport> {
        let job = JobProfile::parse(description);
        tracing::info!(title = %job.title, "processing job");

        let candidates = self.discover(&job).await?;
        if candidates.is_empty() {
            return Ok(JobReport::empty(&job, "no candidates found"));
        }
        tracing::info!(count = candidates.len(), "scoring discovered candidates");

        let pipeline = Pipeline::new(
            self.cache.clone(),
            Arc::clone(&self.oracle),
            self.config.pipeline.clone(),
        )
        .with_cancellation(self.cancel.child_token())
        .with_recompute(recompute);

        let batch = pipeline.run(&job, &candidates).await;

        let mut scored = Vec::new();
        let mut failures = Vec::new();
        for candidate in &candidates {
            match batch.outcomes.get(candidate.identity()) {
                Some(CandidateOutcome::Scored {
                    breakdown,
                    from_cache,
                }) => {
                    self.persist_score(candidate, breakdown).await;
                    scored.push(ScoredCandidate {
                        record: candidate.clone(),
                        breakdown: breakdown.clone(),
                        from_cache: *from_cache,
                    });
                }
                Some(CandidateOutcome::Failed { failure }) => {
                    failures.push(ReportFailure {
                        profile_url: candidate.identity().to_string(),
                        reason: failure.to_string(),
                    });
                }
                None => {}
            }
        }

        // Rank best-first; ties break on URL so output is deterministic
        scored.sort_by(|a, b| {
            b.breakdown
                .composite
                .partial_cmp(&a.breakdown.composite)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.record.profile_url.cmp(&b.record.profile_url))
        });
        failures.sort_by(|a, b| a.profile_url.cmp(&b.profile_url));

        let top_n = self.config.pipeline.top_candidates.min(scored.len());
        let outreach = OutreachService::new(
            self.db.clone(),
            self.cache.clone(),
            Arc::clone(&self.oracle),
        );
        let messages = outreach.generate(&job, &scored[..top_n]).await;

        let report_candidates: Vec<ReportCandidate> = scored
            .into_iter()
            .map(|s| {
                let outreach_message = messages.get(s.record.identity()).cloned();
                ReportCandidate {
                    name: s.record.name.clone(),
                    profile_url: s.record.profile_url.clone(),
                    headline: s.record.headline.clone(),
                    score: s.breakdown.composite,
                    breakdown: s.breakdown,
                    from_cache: s.from_cache,
                    outreach_message,
                }
            })
            .collect();

        Ok(JobReport {
            job_title: job.title.clone(),
            job_identity: job.identity(),
            summary: ReportSummary {
                total_candidates: batch.summary.total,
                scored: batch.summary.scored,
                failed: batch.summary.failed,
                from_cache: batch.summary.from_cache,
                average_score: batch.summary.average_score,
                outreach_count: messages.len(),
            },
            candidates: report_candidates,
            failures,
            error: None,
        })
    }

    /// Process several job descriptions. Per-job errors are folded into the
    /// corresponding report; the run continues.
    pub async fn process_jobs(&self, descriptions: &[String], recompute: bool) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(descriptions.len());
        for description in descriptions {
            match self.process_job(description, recompute).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(error = %e, "job processing failed");
                    let job = JobProfile::parse(description);
                    reports.push(JobReport::empty(&job, &e.to_string()));
                }
            }
        }
        reports
    }

    /// Highest-scored candidates persisted across all runs.
    pub async fn top_candidates(&self, limit: usize) -> Result<Vec<ReportCandidate>> {
        let conn = self.db.connect()?;
        let stored = CandidatesRepository::top(&conn, limit).await?;
        Ok(stored
            .into_iter()
            .filter_map(|s| {
                let breakdown = s.breakdown?;
                Some(ReportCandidate {
                    name: s.record.name.clone(),
                    profile_url: s.record.profile_url.clone(),
                    headline: s.record.headline.clone(),
                    score: s.score.unwrap_or(breakdown.composite),
                    breakdown,
                    from_cache: true,
                    outreach_message: None,
                })
            })
            .collect())
    }

    async fn discover(&self, job: &JobProfile) -> Result<Vec<CandidateRecord>> {
        let truncated: String = job.description.chars().take(100).collect();
        let query = format!("site:linkedin.com/in/ {truncated}");
        let fingerprint = compute_fingerprint(&job.identity(), &query);

        let conn = self.db.connect()?;
        match SearchCacheRepository::get_fresh(
            &conn,
            &fingerprint,
            self.config.discovery.cache_max_age_hours,
        )
        .await
        {
            Ok(Some(cached)) => {
                tracing::info!(count = cached.len(), "using cached search results");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "search cache read failed, searching fresh");
            }
        }

        let profiles = self.discovery.search(job).await?;
        if !profiles.is_empty() {
            if let Err(e) = SearchCacheRepository::put(
                &conn,
                &fingerprint,
                &job.identity(),
                &query,
                &profiles,
            )
            .await
            {
                tracing::warn!(error = %e, "failed to cache search results");
            }
        }
        Ok(profiles)
    }

    async fn persist_score(&self, candidate: &CandidateRecord, breakdown: &ScoreBreakdown) {
        let result = async {
            let conn = self.db.connect()?;
            CandidatesRepository::upsert(&conn, candidate, Some(breakdown.composite), Some(breakdown))
                .await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(
                candidate = candidate.identity(),
                error = %e,
                "failed to persist candidate score"
            );
        }
    }
}
