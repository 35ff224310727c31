use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Score cache: one row per (job, candidate) fingerprint
        CREATE TABLE IF NOT EXISTS score_cache (
            fingerprint TEXT PRIMARY KEY,
            breakdown TEXT NOT NULL,
            outreach TEXT,
            created_at TEXT NOT NULL
        );

        -- Discovered candidates, upserted by profile URL
        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            profile_url TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            headline TEXT,
            profile TEXT,
            score REAL,
            breakdown TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_candidates_score ON candidates(score);

        -- Cached discovery results keyed by (job, query) fingerprint
        CREATE TABLE IF NOT EXISTS search_cache (
            fingerprint TEXT PRIMARY KEY,
            job_identity TEXT NOT NULL,
            query TEXT NOT NULL,
            results TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- Generated outreach messages
        CREATE TABLE IF NOT EXISTS outreach_messages (
            id TEXT PRIMARY KEY,
            candidate_id TEXT NOT NULL,
            job_identity TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (candidate_id) REFERENCES candidates(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_outreach_messages_candidate_id
            ON outreach_messages(candidate_id);
        "#,
    )
    .await?;

    Ok(())
}
