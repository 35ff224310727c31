pub mod api;
pub mod backoff;
pub mod prompts;
pub mod provider;

use async_trait::async_trait;

use crate::error::OracleFailure;
use crate::models::score::CriterionScore;
use crate::models::{CandidateRecord, JobProfile, ScoreBreakdown};

pub use api::OracleApiClient;
pub use backoff::{BackoffPolicy, Sleeper, TokioSleeper};
pub use provider::OracleBackend;

/// Rate-limit channel used for all oracle calls.
pub const ORACLE_CHANNEL: &str = "oracle";

/// The scoring oracle seam. The pipeline only depends on this trait, so
/// tests can substitute a scripted oracle for the remote service.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Score one candidate against one job, returning the raw rubric as
    /// the oracle reported it. Retries and rate-limit admission happen
    /// inside the implementation; a returned failure is terminal for this
    /// call. Composition into a full breakdown is the scorer's job.
    async fn score(
        &self,
        job: &JobProfile,
        candidate: &CandidateRecord,
    ) -> Result<Vec<CriterionScore>, OracleFailure>;

    /// Draft a personalized outreach message for an already-scored
    /// candidate.
    async fn draft_outreach(
        &self,
        job: &JobProfile,
        candidate: &CandidateRecord,
        breakdown: &ScoreBreakdown,
    ) -> Result<String, OracleFailure>;
}
