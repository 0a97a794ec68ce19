//! SQLite-backed local session store
//!
//! Each session is one row: indexed columns for listing plus the full session
//! as a JSON `record` column. WAL mode is enabled for file-backed stores.
//!
//! # Schema
//!
//! 1. **local_sessions** - id, topic, mode, created/updated timestamps, JSON record
//! 2. **schema_version** - schema version for migrations

use anyhow::{anyhow, Context, Result};
use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::LocalSessionStore;
use crate::session::{Session, SessionId};

const SCHEMA_VERSION: i32 = 1;

/// Local session store in a single SQLite file
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the store at `path` and initialize its schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open session store {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// In-memory store with the same schema
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("session store connection lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_sessions (
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                mode TEXT NOT NULL,
                record TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_local_sessions_created_at
            ON local_sessions(created_at DESC);

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i32> {
        let version: i32 =
            self.conn()?
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version)
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_record(record: &str) -> Result<Session> {
    serde_json::from_str(record).context("corrupt session record")
}

impl LocalSessionStore for SqliteSessionStore {
    fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        let record: Option<String> = self
            .conn()?
            .query_row(
                "SELECT record FROM local_sessions WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        record.as_deref().map(decode_record).transpose()
    }

    fn set(&self, session: &Session) -> Result<()> {
        let record = serde_json::to_string(session)?;
        self.conn()?.execute(
            r#"
            INSERT OR REPLACE INTO local_sessions (id, topic, mode, record, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                session.id.to_string(),
                session.topic,
                session.mode.as_str(),
                record,
                timestamp(&session.created_at),
                timestamp(&session.updated_at),
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT record FROM local_sessions ORDER BY created_at DESC, rowid DESC",
        )?;
        let records = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        records.iter().map(|r| decode_record(r)).collect()
    }

    fn delete(&self, id: &SessionId) -> Result<bool> {
        let removed = self.conn()?.execute(
            "DELETE FROM local_sessions WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(removed > 0)
    }
}
