//! Content-addressed score cache.
//!
//! Entries are keyed by a fingerprint derived purely from job and candidate
//! identity, so a (job, candidate) pair always maps to the same row. Entries
//! are only ever created or fully overwritten; the cache itself never
//! expires them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::repository::ScoreCacheRepository;
use crate::db::Database;
use crate::error::{Result, ScoutError};
use crate::models::{CandidateRecord, JobProfile, ScoreBreakdown};

/// Hex length of a fingerprint: the first 160 bits of a SHA-256 digest.
const FINGERPRINT_HEX_LEN: usize = 40;

/// A cached scoring result for one (job, candidate) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub breakdown: ScoreBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outreach: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(fingerprint: String, breakdown: ScoreBreakdown) -> Self {
        Self {
            fingerprint,
            breakdown,
            outreach: None,
            created_at: Utc::now(),
        }
    }
}

/// Deterministic cache key: first 160 bits of SHA-256 over the two
/// identities joined by a unit separator, hex-encoded.
pub fn compute_fingerprint(job_identity: &str, candidate_identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_identity.as_bytes());
    hasher.update([0x1f]);
    hasher.update(candidate_identity.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    hex[..FINGERPRINT_HEX_LEN].to_string()
}

/// Fingerprint for a concrete job/candidate pair.
pub fn fingerprint_for(job: &JobProfile, candidate: &CandidateRecord) -> String {
    compute_fingerprint(&job.identity(), candidate.identity())
}

/// Database-backed score cache. Concurrent `put` of the same fingerprint
/// resolves last-writer-wins (plain row replacement, no row locking);
/// callers treat a lost race as duplicate computation, not corruption.
#[derive(Clone)]
pub struct ScoreCache {
    db: Database,
}

impl ScoreCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch a cached entry. Rows that fail schema validation are reported
    /// as a read failure so the caller can degrade to a recompute.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let conn = self.db.connect()?;
        ScoreCacheRepository::get(&conn, fingerprint).await
    }

    /// Write-through an entry, overwriting any previous row.
    pub async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| ScoutError::CacheWrite(e.to_string()))?;
        ScoreCacheRepository::put(&conn, entry)
            .await
            .map_err(|e| ScoutError::CacheWrite(e.to_string()))
    }

    /// Attach an outreach message to an existing entry.
    pub async fn attach_outreach(&self, fingerprint: &str, message: &str) -> Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| ScoutError::CacheWrite(e.to_string()))?;
        ScoreCacheRepository::attach_outreach(&conn, fingerprint, message)
            .await
            .map_err(|e| ScoutError::CacheWrite(e.to_string()))
    }
}
