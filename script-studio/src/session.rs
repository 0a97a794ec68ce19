//! Session model
//!
//! A session is one completed generation: the request that produced it, the
//! research it gathered, its script variants and the chat thread attached to
//! each variant. Sessions live either in the primary (remote) store or in the
//! local fallback store; [`SessionId`] records which.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use studio_client::types::{NewSession, RemoteSession, RemoteSessionSummary, ScriptRecord};
use studio_client::{ChatMessage, ScriptAngle, ScriptMode};
use uuid::Uuid;

/// Prefix marking ids issued by the local store
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Which store owns a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Remote,
    Local,
}

/// Session identifier tagged with its origin
///
/// Displays as the bare remote id, or as `local_<uuid>` for local sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    origin: Origin,
    key: String,
}

impl SessionId {
    pub fn remote(key: impl Into<String>) -> Self {
        Self {
            origin: Origin::Remote,
            key: key.into(),
        }
    }

    pub fn new_local() -> Self {
        Self {
            origin: Origin::Local,
            key: Uuid::new_v4().to_string(),
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Id without the origin prefix
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Origin::Remote => f.write_str(&self.key),
            Origin::Local => write!(f, "{}{}", LOCAL_ID_PREFIX, self.key),
        }
    }
}

impl FromStr for SessionId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        let id = match s.strip_prefix(LOCAL_ID_PREFIX) {
            Some(key) => Self {
                origin: Origin::Local,
                key: key.to_string(),
            },
            None => Self::remote(s),
        };
        if id.key.is_empty() {
            anyhow::bail!("session id must not be empty");
        }
        Ok(id)
    }
}

/// One script variant. `number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptVariant {
    pub number: usize,
    pub content: String,
    pub angle: ScriptAngle,
}

impl ScriptVariant {
    pub fn to_record(&self) -> ScriptRecord {
        ScriptRecord {
            script_number: self.number,
            script_content: self.content.clone(),
            angle_name: self.angle.name.clone(),
            angle_focus: self.angle.focus.clone(),
            angle_hook_style: self.angle.hook_style.clone().unwrap_or_default(),
        }
    }
}

/// Everything a finished generation hands to the session gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub topic: String,
    pub mode: ScriptMode,
    pub notes: String,
    /// Deduplicated research facts, newline-joined
    pub research: String,
    pub sources: Vec<String>,
    pub skip_research: bool,
    pub variants: Vec<ScriptVariant>,
}

impl SessionDraft {
    pub fn to_new_session(&self) -> NewSession {
        NewSession {
            topic: self.topic.clone(),
            mode: self.mode,
            user_notes: self.notes.clone(),
            research_data: self.research.clone(),
            research_sources: self.sources.clone(),
            skip_research: self.skip_research,
        }
    }

    /// Stamp the draft with an id and creation time
    pub fn into_session(self, id: SessionId) -> Session {
        let now = Utc::now();
        Session {
            id,
            topic: self.topic,
            mode: self.mode,
            notes: self.notes,
            research: self.research,
            sources: self.sources,
            skip_research: self.skip_research,
            variants: self.variants,
            chat_history: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub topic: String,
    pub mode: ScriptMode,
    pub notes: String,
    pub research: String,
    pub sources: Vec<String>,
    pub skip_research: bool,
    pub variants: Vec<ScriptVariant>,
    /// Chat threads keyed by 1-based variant number
    #[serde(default)]
    pub chat_history: BTreeMap<usize, Vec<ChatMessage>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn from_remote(remote: RemoteSession) -> Self {
        let mut scripts = remote.scripts;
        scripts.sort_by_key(|s| s.script_number);
        let variants = scripts
            .into_iter()
            .map(|record| ScriptVariant {
                number: record.script_number,
                angle: record.angle(),
                content: record.script_content,
            })
            .collect();

        let created_at = remote.created_at.unwrap_or_else(Utc::now);
        Self {
            id: SessionId::remote(remote.id),
            topic: remote.topic,
            mode: remote.mode,
            notes: remote.user_notes,
            research: remote.research_data,
            sources: remote.research_sources,
            skip_research: remote.skip_research,
            variants,
            chat_history: remote.chat_history,
            created_at,
            updated_at: remote.updated_at.unwrap_or(created_at),
        }
    }

    pub fn variant_mut(&mut self, number: usize) -> Option<&mut ScriptVariant> {
        self.variants.iter_mut().find(|v| v.number == number)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            topic: self.topic.clone(),
            mode: self.mode,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            variant_count: Some(self.variants.len()),
        }
    }
}

/// History list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub topic: String,
    pub mode: ScriptMode,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Unknown for remote summaries
    pub variant_count: Option<usize>,
}

impl From<RemoteSessionSummary> for SessionSummary {
    fn from(remote: RemoteSessionSummary) -> Self {
        Self {
            id: SessionId::remote(remote.id),
            topic: remote.topic,
            mode: remote.mode,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            variant_count: None,
        }
    }
}
