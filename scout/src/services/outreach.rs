use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{fingerprint_for, ScoreCache};
use crate::db::repository::{CandidatesRepository, OutreachMessagesRepository};
use crate::db::Database;
use crate::llm::{prompts, ScoringOracle};
use crate::models::JobProfile;
use crate::services::ScoredCandidate;

/// Drafts personalized outreach for scored candidates.
///
/// Oracle failures degrade to a neutral template; persistence failures are
/// logged and the message is still returned. Messages are stored in the
/// outreach table and attached to the candidate's cache entry.
pub struct OutreachService {
    db: Database,
    cache: ScoreCache,
    oracle: Arc<dyn ScoringOracle>,
}

impl OutreachService {
    pub fn new(db: Database, cache: ScoreCache, oracle: Arc<dyn ScoringOracle>) -> Self {
        Self { db, cache, oracle }
    }

    /// Generate one message per candidate, keyed by candidate identity.
    pub async fn generate(
        &self,
        job: &JobProfile,
        candidates: &[ScoredCandidate],
    ) -> HashMap<String, String> {
        let mut messages = HashMap::with_capacity(candidates.len());

        for scored in candidates {
            let message = match self
                .oracle
                .draft_outreach(job, &scored.record, &scored.breakdown)
                .await
            {
                Ok(message) => message,
                Err(failure) => {
                    tracing::warn!(
                        candidate = scored.record.identity(),
                        error = %failure,
                        "outreach generation failed, using fallback template"
                    );
                    prompts::fallback_outreach(&scored.record)
                }
            };

            self.persist(job, scored, &message).await;
            messages.insert(scored.record.identity().to_string(), message);
        }

        messages
    }

    async fn persist(&self, job: &JobProfile, scored: &ScoredCandidate, message: &str) {
        let conn = match self.db.connect() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "skipping outreach persistence: no connection");
                return;
            }
        };

        match CandidatesRepository::upsert(
            &conn,
            &scored.record,
            Some(scored.breakdown.composite),
            Some(&scored.breakdown),
        )
        .await
        {
            Ok(candidate_id) => {
                if let Err(e) = OutreachMessagesRepository::create(
                    &conn,
                    &candidate_id,
                    &job.identity(),
                    message,
                )
                .await
                {
                    tracing::warn!(error = %e, "failed to store outreach message");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to upsert candidate for outreach");
            }
        }

        let fingerprint = fingerprint_for(job, &scored.record);
        if let Err(e) = self.cache.attach_outreach(&fingerprint, message).await {
            // The cache entry may be missing if its write failed earlier
            tracing::warn!(
                candidate = scored.record.identity(),
                error = %e,
                "could not attach outreach to cache entry"
            );
        }
    }
}
