//! SQLite-backed session store.
//!
//! One connection behind a mutex; every call runs on the blocking pool so
//! the async caller never waits on disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use portalchat_core::SessionStore;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

/// Shared handle to the PortalChat database.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self::from_connection(conn)?;
        info!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS portal_configs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                parameters TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .context("Failed to initialise schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("SQLite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("SQLite task failed")?
    }
}

/// Session keys in the `session_kv` table.
#[derive(Clone)]
pub struct SqliteSessionStore {
    db: SqliteDatabase,
}

impl SqliteSessionStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }
}

const UPSERT_KV: &str = "INSERT INTO session_kv (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT value FROM session_kv WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .context("Failed to read session key")
            })
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.db
            .call(move |conn| {
                conn.execute(UPSERT_KV, params![key, value, chrono::Utc::now().to_rfc3339()])
                    .context("Failed to write session key")?;
                Ok(())
            })
            .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM session_kv WHERE key = ?1", params![key])
                    .context("Failed to delete session key")?;
                Ok(())
            })
            .await
    }

    /// All keys land in one transaction, or none do.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let entries: Vec<(String, String)> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.db
            .call(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                for (key, value) in &entries {
                    tx.execute(UPSERT_KV, params![key, value, now])?;
                }
                tx.commit().context("Failed to commit session keys")
            })
            .await
    }
}
