//! Session persistence gateway
//!
//! Writes go to the primary (remote) store when one is configured and fall
//! back to the local store on any failure, including a failure partway
//! through writing a session's variants. Remote trouble is logged and never
//! returned to the caller. Reads merge both stores, primary entries first.

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::Arc;
use studio_client::transport::SessionApi;
use studio_client::ChatMessage;

use crate::session::{Session, SessionDraft, SessionId, SessionSummary};
use crate::store::LocalSessionStore;

/// Maximum sessions kept in the local store; oldest are evicted first
pub const LOCAL_SESSION_CAP: usize = 20;

#[derive(Clone)]
pub struct SessionGateway {
    remote: Option<Arc<dyn SessionApi>>,
    local: Arc<dyn LocalSessionStore>,
}

impl SessionGateway {
    pub fn new(remote: Option<Arc<dyn SessionApi>>, local: Arc<dyn LocalSessionStore>) -> Self {
        Self { remote, local }
    }

    pub fn local_only(local: Arc<dyn LocalSessionStore>) -> Self {
        Self::new(None, local)
    }

    /// Save a finished generation and return where it landed
    ///
    /// Only fails when the local fallback itself fails.
    pub async fn persist(&self, draft: SessionDraft) -> Result<SessionId> {
        if let Some(remote) = &self.remote {
            match Self::persist_remote(remote.as_ref(), &draft).await {
                Ok(id) => {
                    tracing::info!(session_id = %id, variants = draft.variants.len(), "session saved to primary store");
                    return Ok(id);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "primary session store unavailable, saving locally");
                }
            }
        }

        let id = self.persist_local(draft)?;
        tracing::info!(session_id = %id, "session saved to local store");
        Ok(id)
    }

    async fn persist_remote(
        remote: &dyn SessionApi,
        draft: &SessionDraft,
    ) -> studio_client::Result<SessionId> {
        let key = remote.create_session(&draft.to_new_session()).await?;
        for variant in &draft.variants {
            remote.create_script(&key, &variant.to_record()).await?;
        }
        Ok(SessionId::remote(key))
    }

    fn persist_local(&self, draft: SessionDraft) -> Result<SessionId> {
        let session = draft.into_session(SessionId::new_local());
        self.local.set(&session)?;
        self.evict_over_cap()?;
        Ok(session.id)
    }

    fn evict_over_cap(&self) -> Result<()> {
        for stale in self.local.list()?.iter().skip(LOCAL_SESSION_CAP) {
            tracing::debug!(session_id = %stale.id, "evicting local session over cap");
            self.local.delete(&stale.id)?;
        }
        Ok(())
    }

    /// Remote history in the primary store's order, then local history newest first
    ///
    /// A failing store contributes nothing rather than an error. Entries are
    /// de-duplicated by id, first occurrence wins.
    pub async fn list_history(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = Vec::new();

        if let Some(remote) = &self.remote {
            match remote.list_sessions().await {
                Ok(remote_sessions) => {
                    summaries.extend(remote_sessions.into_iter().map(SessionSummary::from))
                }
                Err(err) => tracing::warn!(error = %err, "could not list remote sessions"),
            }
        }

        match self.local.list() {
            Ok(local) => summaries.extend(local.iter().map(Session::summary)),
            Err(err) => tracing::warn!(error = %err, "could not list local sessions"),
        }

        let mut seen = HashSet::new();
        summaries.retain(|summary| seen.insert(summary.id.clone()));
        summaries
    }

    /// Load a full session from whichever store owns it
    pub async fn load(&self, id: &SessionId) -> Result<Option<Session>> {
        if id.is_local() {
            return self.local.get(id);
        }
        let Some(remote) = &self.remote else {
            tracing::warn!(session_id = %id, "remote session requested but no primary store configured");
            return Ok(None);
        };
        match remote.fetch_session(id.key()).await {
            Ok(found) => Ok(found.map(Session::from_remote)),
            Err(err) => {
                tracing::warn!(session_id = %id, error = %err, "could not load remote session");
                Ok(None)
            }
        }
    }

    /// Returns whether the session was deleted
    pub async fn delete(&self, id: &SessionId) -> Result<bool> {
        if id.is_local() {
            return self.local.delete(id);
        }
        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        match remote.delete_session(id.key()).await {
            Ok(()) => Ok(true),
            Err(err) => {
                tracing::warn!(session_id = %id, error = %err, "could not delete remote session");
                Ok(false)
            }
        }
    }

    /// Mirror an edited variant into its session. Best effort.
    pub async fn update_script(&self, id: &SessionId, number: usize, content: &str) {
        let result = if id.is_local() {
            self.modify_local(id, |session| {
                if let Some(variant) = session.variant_mut(number) {
                    variant.content = content.to_string();
                }
            })
        } else if let Some(remote) = &self.remote {
            remote
                .update_script(id.key(), number, content)
                .await
                .map_err(anyhow::Error::from)
        } else {
            Err(anyhow!("no primary session store configured"))
        };
        if let Err(err) = result {
            tracing::warn!(session_id = %id, script_number = number, error = %err, "failed to store script edit");
        }
    }

    /// Mirror a chat turn into its session. Best effort.
    pub async fn append_chat(&self, id: &SessionId, number: usize, message: &ChatMessage) {
        let result = if id.is_local() {
            self.modify_local(id, |session| {
                session
                    .chat_history
                    .entry(number)
                    .or_default()
                    .push(message.clone());
            })
        } else if let Some(remote) = &self.remote {
            remote
                .append_chat(id.key(), number, message)
                .await
                .map_err(anyhow::Error::from)
        } else {
            Err(anyhow!("no primary session store configured"))
        };
        if let Err(err) = result {
            tracing::warn!(session_id = %id, script_number = number, error = %err, "failed to store chat message");
        }
    }

    fn modify_local(&self, id: &SessionId, change: impl FnOnce(&mut Session)) -> Result<()> {
        let Some(mut session) = self.local.get(id)? else {
            anyhow::bail!("local session {} not found", id);
        };
        change(&mut session);
        session.updated_at = chrono::Utc::now();
        self.local.set(&session)
    }
}
