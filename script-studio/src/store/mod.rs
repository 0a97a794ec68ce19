//! Local session storage
//!
//! The fallback side of the session gateway. Implementations key sessions by
//! their full [`SessionId`] and list them newest first.

mod sqlite;

pub use sqlite::SqliteSessionStore;

use anyhow::{anyhow, Result};
use std::sync::Mutex;

use crate::session::{Session, SessionId};

/// Key-value store for sessions that could not reach the primary store
pub trait LocalSessionStore: Send + Sync {
    fn get(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Insert or replace
    fn set(&self, session: &Session) -> Result<()>;

    /// All sessions, most recently created first
    fn list(&self) -> Result<Vec<Session>>;

    /// Returns whether anything was removed
    fn delete(&self, id: &SessionId) -> Result<bool>;
}

/// In-process store, used by tests and `--ephemeral` runs
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Session>>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow!("memory session store lock poisoned"))
    }
}

impl LocalSessionStore for MemorySessionStore {
    fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.lock()?.iter().find(|s| &s.id == id).cloned())
    }

    fn set(&self, session: &Session) -> Result<()> {
        let mut sessions = self.lock()?;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.lock()?.iter().rev().cloned().collect();
        // stable: equal timestamps keep newest-inserted first
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    fn delete(&self, id: &SessionId) -> Result<bool> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|s| &s.id != id);
        Ok(sessions.len() != before)
    }
}
