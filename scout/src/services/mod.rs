pub mod agent;
pub mod outreach;
pub mod pipeline;

pub use agent::{JobReport, SourcingAgent};
pub use outreach::OutreachService;
pub use pipeline::{BatchResult, CandidateOutcome, Pipeline, PipelineFailure};

use crate::models::{CandidateRecord, ScoreBreakdown};

/// A candidate that made it through the pipeline, ready for ranking and
/// outreach.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub record: CandidateRecord,
    pub breakdown: ScoreBreakdown,
    pub from_cache: bool,
}
