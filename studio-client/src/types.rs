//! Wire types for the studio service
//!
//! Everything the service sends or accepts is described here: the generation
//! request, the NDJSON stream events, chat-edit payloads and the session
//! records exchanged with the primary session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, StudioError};

// ============================================================================
// Generation request
// ============================================================================

/// Script style requested from the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptMode {
    #[default]
    Informational,
    Listical,
}

impl ScriptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptMode::Informational => "informational",
            ScriptMode::Listical => "listical",
        }
    }
}

impl fmt::Display for ScriptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptMode {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "informational" => Ok(ScriptMode::Informational),
            "listical" => Ok(ScriptMode::Listical),
            other => Err(StudioError::InvalidRequest(format!(
                "unknown mode '{}' (expected informational or listical)",
                other
            ))),
        }
    }
}

/// A source document attached to a generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).map(str::to_string);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read an attachment from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

/// MIME type for the attachment kinds the service understands
fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "md" | "markdown" => Some("text/markdown"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// A single generation job submission. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: String,
    pub notes: String,
    pub mode: ScriptMode,
    pub skip_research: bool,
    pub attachments: Vec<Attachment>,
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            notes: String::new(),
            mode: ScriptMode::default(),
            skip_research: false,
            attachments: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_mode(mut self, mode: ScriptMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_skip_research(mut self, skip: bool) -> Self {
        self.skip_research = skip;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Same request with a different topic (used when resuming after a clarification)
    pub fn with_topic(&self, topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..self.clone()
        }
    }

    /// Reject requests the service would refuse anyway
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(StudioError::InvalidRequest("topic must not be empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Stream events
// ============================================================================

/// Framing/angle metadata for one script variant
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptAngle {
    pub name: String,
    #[serde(default)]
    pub focus: String,
    #[serde(default, alias = "hookStyle", skip_serializing_if = "Option::is_none")]
    pub hook_style: Option<String>,
}

impl ScriptAngle {
    pub fn new(name: impl Into<String>, focus: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            focus: focus.into(),
            hook_style: None,
        }
    }

    /// Angle inferred for a variant the service sent no metadata for
    pub fn fallback(index: usize) -> Self {
        Self::new(format!("Script {}", index + 1), "")
    }
}

/// Hook ranking produced by the checker stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRanking {
    pub ranking: Vec<i64>,
    pub best: i64,
}

/// Structured `result` payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuredResult {
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub angles: Vec<ScriptAngle>,
    #[serde(default, alias = "combined_output", skip_serializing_if = "Option::is_none")]
    pub combined: Option<String>,
    /// Older single-script backends send `draft`/`optimized` instead of `scripts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized: Option<String>,
}

/// Payload of a `result` event: a bare script or a structured payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Script(String),
    Structured(StructuredResult),
}

/// A result payload reduced to the variant list and the single fallback script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedResult {
    pub scripts: Vec<String>,
    pub angles: Vec<ScriptAngle>,
    pub final_script: String,
    /// First-pass text of a `{draft, optimized}` result, kept next to the optimized script
    pub draft: Option<String>,
}

impl ResultPayload {
    pub fn normalize(self) -> NormalizedResult {
        match self {
            ResultPayload::Script(script) => NormalizedResult {
                scripts: if script.is_empty() {
                    Vec::new()
                } else {
                    vec![script.clone()]
                },
                angles: Vec::new(),
                final_script: script,
                draft: None,
            },
            ResultPayload::Structured(result) => {
                let draft = non_empty(result.draft);
                let legacy = non_empty(result.optimized).or_else(|| draft.clone());
                let scripts = if result.scripts.is_empty() {
                    legacy.clone().into_iter().collect()
                } else {
                    result.scripts
                };
                let final_script = non_empty(result.combined)
                    .or(legacy)
                    .or_else(|| scripts.first().cloned())
                    .unwrap_or_default();
                NormalizedResult {
                    scripts,
                    angles: result.angles,
                    final_script,
                    draft,
                }
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Why the service paused the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedsInputKind {
    #[default]
    Clarification,
    #[serde(alias = "angle-selection", alias = "angleSelection")]
    AngleSelection,
    /// A kind this client does not know; the job still pauses
    #[serde(other)]
    Other,
}

/// One decoded record of the generation stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        message: String,
    },
    Research {
        data: String,
    },
    Sources {
        data: Vec<String>,
    },
    Analysis {
        data: String,
    },
    HookRanking {
        data: HookRanking,
    },
    Angles {
        data: Vec<ScriptAngle>,
    },
    ScriptComplete {
        index: usize,
        #[serde(default)]
        angle_name: Option<String>,
    },
    Result {
        data: ResultPayload,
    },
    NeedsInput {
        #[serde(default)]
        kind: NeedsInputKind,
        message: String,
        #[serde(default)]
        options: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// Discriminator values this client understands
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "status",
        "research",
        "sources",
        "analysis",
        "hook_ranking",
        "angles",
        "script_complete",
        "result",
        "needs_input",
        "error",
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            StreamEvent::Status { .. } => "status",
            StreamEvent::Research { .. } => "research",
            StreamEvent::Sources { .. } => "sources",
            StreamEvent::Analysis { .. } => "analysis",
            StreamEvent::HookRanking { .. } => "hook_ranking",
            StreamEvent::Angles { .. } => "angles",
            StreamEvent::ScriptComplete { .. } => "script_complete",
            StreamEvent::Result { .. } => "result",
            StreamEvent::NeedsInput { .. } => "needs_input",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Events after which the service sends nothing more for this job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Result { .. } | StreamEvent::NeedsInput { .. } | StreamEvent::Error { .. }
        )
    }
}

// ============================================================================
// Chat edits
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single turn in a per-variant chat thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            id: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            id: None,
            created_at: Some(Utc::now()),
        }
    }
}

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEditRequest {
    pub script: String,
    pub message: String,
    pub script_number: usize,
    pub angle_name: String,
    pub angle_focus: String,
}

/// Reply of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatEditReply {
    pub response: String,
    #[serde(default)]
    pub script_updated: bool,
    #[serde(default)]
    pub updated_script: Option<String>,
}

impl ChatEditReply {
    /// New script content, if the service actually changed it
    pub fn replacement(&self) -> Option<&str> {
        if !self.script_updated {
            return None;
        }
        self.updated_script
            .as_deref()
            .filter(|script| !script.trim().is_empty())
    }
}

// ============================================================================
// Training
// ============================================================================

/// Opening style of a reference script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookType {
    #[default]
    Shock,
    Question,
    Negative,
    Story,
}

impl HookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::Shock => "shock",
            HookType::Question => "question",
            HookType::Negative => "negative",
            HookType::Story => "story",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookType {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shock" => Ok(HookType::Shock),
            "question" => Ok(HookType::Question),
            "negative" => Ok(HookType::Negative),
            "story" => Ok(HookType::Story),
            other => Err(StudioError::InvalidRequest(format!(
                "unknown hook type '{}' (expected shock, question, negative or story)",
                other
            ))),
        }
    }
}

/// Body of `POST /train_script`: a finished script added to the reference library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingScript {
    pub title: String,
    pub script_content: String,
    pub mode: ScriptMode,
    pub hook_type: HookType,
}

impl TrainingScript {
    pub fn new(title: impl Into<String>, script_content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            script_content: script_content.into(),
            mode: ScriptMode::default(),
            hook_type: HookType::default(),
        }
    }

    pub fn with_mode(mut self, mode: ScriptMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hook_type(mut self, hook_type: HookType) -> Self {
        self.hook_type = hook_type;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(StudioError::InvalidRequest("title must not be empty".into()));
        }
        if self.script_content.trim().is_empty() {
            return Err(StudioError::InvalidRequest("script must not be empty".into()));
        }
        Ok(())
    }
}

/// Reply of `POST /train_script`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrainingReceipt {
    pub script_id: String,
    #[serde(default)]
    pub meta_preview: TrainingPreview,
}

/// What the service extracted from a training script
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TrainingPreview {
    #[serde(default)]
    pub skeleton: String,
    #[serde(default)]
    pub mode: Option<ScriptMode>,
}

// ============================================================================
// Session store records
// ============================================================================

/// Body of `POST /sessions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSession {
    pub topic: String,
    pub mode: ScriptMode,
    pub user_notes: String,
    pub research_data: String,
    pub research_sources: Vec<String>,
    pub skip_research: bool,
}

/// Reply of `POST /sessions`; other columns are ignored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedSession {
    pub id: String,
}

/// One stored script variant (`session_scripts` row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub script_number: usize,
    pub script_content: String,
    #[serde(default)]
    pub angle_name: String,
    #[serde(default)]
    pub angle_focus: String,
    #[serde(default)]
    pub angle_hook_style: String,
}

impl ScriptRecord {
    pub fn angle(&self) -> ScriptAngle {
        ScriptAngle {
            name: self.angle_name.clone(),
            focus: self.angle_focus.clone(),
            hook_style: Some(self.angle_hook_style.clone()).filter(|s| !s.is_empty()),
        }
    }
}

/// Entry of `GET /sessions`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSessionSummary {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub mode: ScriptMode,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reply of `GET /sessions/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSession {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub mode: ScriptMode,
    #[serde(default)]
    pub user_notes: String,
    #[serde(default)]
    pub research_data: String,
    #[serde(default)]
    pub research_sources: Vec<String>,
    #[serde(default)]
    pub skip_research: bool,
    #[serde(default)]
    pub scripts: Vec<ScriptRecord>,
    /// Keyed by 1-based script number
    #[serde(default)]
    pub chat_history: BTreeMap<usize, Vec<ChatMessage>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
