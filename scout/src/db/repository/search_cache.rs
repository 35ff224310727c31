use chrono::{DateTime, Duration, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::CandidateRecord;

/// Cached discovery results. Unlike the score cache, these rows have a
/// freshness window: stale rows are ignored (and overwritten on the next
/// successful search).
pub struct SearchCacheRepository;

impl SearchCacheRepository {
    pub async fn put(
        conn: &Connection,
        fingerprint: &str,
        job_identity: &str,
        query: &str,
        results: &[CandidateRecord],
    ) -> Result<()> {
        let results_json = serde_json::to_string(results)?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO search_cache
                (fingerprint, job_identity, query, results, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                fingerprint,
                job_identity,
                query,
                results_json,
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    /// Return cached results no older than `max_age_hours`.
    pub async fn get_fresh(
        conn: &Connection,
        fingerprint: &str,
        max_age_hours: i64,
    ) -> Result<Option<Vec<CandidateRecord>>> {
        let mut rows = conn
            .query(
                "SELECT results, created_at FROM search_cache WHERE fingerprint = ?1",
                params![fingerprint],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let created_at = DateTime::parse_from_rfc3339(&row.get::<String>(1)?)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        if Utc::now() - created_at > Duration::hours(max_age_hours) {
            return Ok(None);
        }

        let results_json: String = row.get(0)?;
        match serde_json::from_str(&results_json) {
            Ok(results) => Ok(Some(results)),
            Err(e) => {
                // Degrade to a re-search rather than failing discovery
                tracing::warn!(fingerprint, error = %e, "discarding unparseable search cache row");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Connection {
        Database::in_memory().await.unwrap().connect().unwrap()
    }

    #[tokio::test]
    async fn fresh_results_round_trip() {
        let conn = setup().await;
        let results = vec![
            CandidateRecord::new("https://example.com/in/a", "A"),
            CandidateRecord::new("https://example.com/in/b", "B"),
        ];

        SearchCacheRepository::put(&conn, "fp1", "job-1", "rust engineer", &results)
            .await
            .unwrap();

        let cached = SearchCacheRepository::get_fresh(&conn, "fp1", 24)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, results);
    }

    #[tokio::test]
    async fn stale_results_are_ignored() {
        let conn = setup().await;
        let stale = (Utc::now() - Duration::hours(48)).to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO search_cache (fingerprint, job_identity, query, results, created_at)
            VALUES ('fp2', 'job-1', 'q', '[]', ?1)
            "#,
            params![stale],
        )
        .await
        .unwrap();

        let cached = SearchCacheRepository::get_fresh(&conn, "fp2", 24).await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn corrupt_results_degrade_to_miss() {
        let conn = setup().await;
        conn.execute(
            r#"
            INSERT INTO search_cache (fingerprint, job_identity, query, results, created_at)
            VALUES ('fp3', 'job-1', 'q', 'not json', ?1)
            "#,
            params![Utc::now().to_rfc3339()],
        )
        .await
        .unwrap();

        let cached = SearchCacheRepository::get_fresh(&conn, "fp3", 24).await.unwrap();
        assert!(cached.is_none());
    }
}
