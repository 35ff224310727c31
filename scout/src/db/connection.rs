use libsql::{Builder, Connection};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::Result;

use super::schema;

/// Handle to the backing libsql database (local file, `:memory:`, or a
/// remote/replicated instance). Cheap to clone; all clones share the
/// underlying database.
pub struct Database {
    db: Arc<libsql::Database>,
    /// For shared-cache in-memory databases, a single connection must stay
    /// open for the store to survive — SQLite discards a shared-cache
    /// in-memory database once its last connection closes. Held here so the
    /// schema created at construction time outlives `init()`. `None` for
    /// file/remote backends, which persist independently of open
    /// connections.
    _keepalive: Option<Arc<Connection>>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db = if config.url.starts_with("libsql://") || config.url.starts_with("https://") {
            if let Some(ref local_path) = config.local_path {
                Builder::new_remote_replica(
                    local_path,
                    config.url.clone(),
                    config.auth_token.clone().unwrap_or_default(),
                )
                .build()
                .await?
            } else {
                Builder::new_remote(
                    config.url.clone(),
                    config.auth_token.clone().unwrap_or_default(),
                )
                .build()
                .await?
            }
        } else if config.url == ":memory:" {
            // A bare `:memory:` database is private to each connection, so
            // connections opened later (by `connect()`) would not see the
            // schema created during `init()`. Use a uniquely-named
            // shared-cache in-memory database instead: all connections from
            // this `Database` share one in-memory store, while distinct
            // `Database` instances remain isolated from one another.
            static MEMORY_DB_SEQ: AtomicU64 = AtomicU64::new(0);
            let id = MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed);
            let shared_url = format!("file:scout-mem-{id}?mode=memory&cache=shared");
            Builder::new_local(shared_url).build().await?
        } else {
            let path = config.url.strip_prefix("file:").unwrap_or(&config.url);
            Builder::new_local(path).build().await?
        };

        let is_memory = config.url == ":memory:";
        let db = Arc::new(db);

        let conn = db.connect()?;
        if let Err(error) = conn.execute_batch("PRAGMA busy_timeout = 5000").await {
            tracing::warn!(error = %error, "Failed to set SQLite busy_timeout");
        }
        schema::init_schema(&conn).await?;

        let keepalive = if is_memory {
            Some(Arc::new(conn))
        } else {
            None
        };

        Ok(Self {
            db,
            _keepalive: keepalive,
        })
    }

    /// In-memory database for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::new(&DatabaseConfig {
            url: ":memory:".to_string(),
            auth_token: None,
            local_path: None,
        })
        .await
    }

    pub fn connect(&self) -> Result<Connection> {
        Ok(self.db.connect()?)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            _keepalive: self._keepalive.clone(),
        }
    }
}
