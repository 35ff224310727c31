use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::cache::CacheEntry;
use crate::error::{Result, ScoutError};
use crate::models::ScoreBreakdown;

pub struct ScoreCacheRepository;

impl ScoreCacheRepository {
    /// Fetch one cache row by fingerprint. Rows whose breakdown payload
    /// fails schema validation are rejected as a read failure instead of
    /// being returned half-populated.
    pub async fn get(conn: &Connection, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let mut rows = conn
            .query(
                r#"
                SELECT fingerprint, breakdown, outreach, created_at
                FROM score_cache
                WHERE fingerprint = ?1
                "#,
                params![fingerprint],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert or fully overwrite (last writer wins).
    pub async fn put(conn: &Connection, entry: &CacheEntry) -> Result<()> {
        let breakdown = serde_json::to_string(&entry.breakdown)?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO score_cache (fingerprint, breakdown, outreach, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                entry.fingerprint.as_str(),
                breakdown,
                entry.outreach.as_deref(),
                entry.created_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    /// Set the outreach text on an existing row.
    pub async fn attach_outreach(
        conn: &Connection,
        fingerprint: &str,
        message: &str,
    ) -> Result<()> {
        let updated = conn
            .execute(
                "UPDATE score_cache SET outreach = ?1 WHERE fingerprint = ?2",
                params![message, fingerprint],
            )
            .await?;

        if updated == 0 {
            return Err(ScoutError::NotFound(format!(
                "no cache entry for fingerprint {fingerprint}"
            )));
        }
        Ok(())
    }

    fn row_to_entry(row: &libsql::Row) -> Result<CacheEntry> {
        let fingerprint: String = row.get(0)?;
        let breakdown_json: String = row.get(1)?;

        let breakdown: ScoreBreakdown = serde_json::from_str(&breakdown_json).map_err(|e| {
            ScoutError::CacheRead(format!(
                "cache row {fingerprint} has unparseable breakdown: {e}"
            ))
        })?;
        breakdown.validate().map_err(|e| {
            ScoutError::CacheRead(format!("cache row {fingerprint} failed validation: {e}"))
        })?;

        Ok(CacheEntry {
            fingerprint,
            breakdown,
            outreach: row.get(2)?,
            created_at: DateTime::parse_from_rfc3339(&row.get::<String>(3)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
