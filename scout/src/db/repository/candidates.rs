use chrono::{DateTime, Utc};
use libsql::{params, Connection};
use nanoid::nanoid;

use crate::error::Result;
use crate::models::{CandidateRecord, ScoreBreakdown};

/// A candidate row, including the latest score if one has been computed.
#[derive(Debug, Clone)]
pub struct StoredCandidate {
    pub id: String,
    pub record: CandidateRecord,
    pub score: Option<f64>,
    pub breakdown: Option<ScoreBreakdown>,
    pub updated_at: DateTime<Utc>,
}

pub struct CandidatesRepository;

impl CandidatesRepository {
    /// Insert a candidate or update the existing row for the same profile
    /// URL. Returns the row id either way.
    pub async fn upsert(
        conn: &Connection,
        record: &CandidateRecord,
        score: Option<f64>,
        breakdown: Option<&ScoreBreakdown>,
    ) -> Result<String> {
        let profile = serde_json::to_string(record)?;
        let breakdown_json = breakdown.map(serde_json::to_string).transpose()?;
        let now = Utc::now().to_rfc3339();

        let mut rows = conn
            .query(
                "SELECT id FROM candidates WHERE profile_url = ?1",
                params![record.profile_url.as_str()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            conn.execute(
                r#"
                UPDATE candidates
                SET name = ?1, headline = ?2, profile = ?3,
                    score = COALESCE(?4, score),
                    breakdown = COALESCE(?5, breakdown),
                    updated_at = ?6
                WHERE id = ?7
                "#,
                params![
                    record.name.as_str(),
                    record.headline.as_deref(),
                    profile,
                    score,
                    breakdown_json.as_deref(),
                    now,
                    id.as_str(),
                ],
            )
            .await?;
            return Ok(id);
        }

        let id = nanoid!();
        conn.execute(
            r#"
            INSERT INTO candidates (
                id, profile_url, name, headline, profile, score, breakdown,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
            params![
                id.as_str(),
                record.profile_url.as_str(),
                record.name.as_str(),
                record.headline.as_deref(),
                profile,
                score,
                breakdown_json.as_deref(),
                now,
            ],
        )
        .await?;

        Ok(id)
    }

    pub async fn get_by_url(
        conn: &Connection,
        profile_url: &str,
    ) -> Result<Option<StoredCandidate>> {
        let mut rows = conn
            .query(
                r#"
                SELECT id, profile, score, breakdown, updated_at
                FROM candidates
                WHERE profile_url = ?1
                "#,
                params![profile_url],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_candidate(&row)?)),
            None => Ok(None),
        }
    }

    /// Highest-scored candidates, best first. Unscored rows are excluded.
    pub async fn top(conn: &Connection, limit: usize) -> Result<Vec<StoredCandidate>> {
        let mut rows = conn
            .query(
                r#"
                SELECT id, profile, score, breakdown, updated_at
                FROM candidates
                WHERE score IS NOT NULL
                ORDER BY score DESC
                LIMIT ?1
                "#,
                params![limit as i64],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_candidate(&row)?);
        }
        Ok(results)
    }

    fn row_to_candidate(row: &libsql::Row) -> Result<StoredCandidate> {
        let profile_json: String = row.get(1)?;
        let breakdown_json: Option<String> = row.get(3)?;

        Ok(StoredCandidate {
            id: row.get(0)?,
            record: serde_json::from_str(&profile_json)?,
            score: row.get(2)?,
            breakdown: breakdown_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(4)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

pub struct OutreachMessagesRepository;

impl OutreachMessagesRepository {
    pub async fn create(
        conn: &Connection,
        candidate_id: &str,
        job_identity: &str,
        message: &str,
    ) -> Result<String> {
        let id = nanoid!();
        conn.execute(
            r#"
            INSERT INTO outreach_messages (id, candidate_id, job_identity, message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id.as_str(),
                candidate_id,
                job_identity,
                message,
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;
        Ok(id)
    }
}
