//! Transport layer
//!
//! One seam per concern of the service: opening a generation stream, the
//! session store endpoints, the chat-edit endpoint and script training. [`HttpTransport`]
//! implements all of them over HTTP; tests substitute in-memory fakes.

mod http;

pub use http::{HttpTransport, HttpTransportConfig};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{
    ChatEditReply, ChatEditRequest, ChatMessage, GenerationRequest, NewSession, RemoteSession,
    RemoteSessionSummary, ScriptRecord, TrainingReceipt, TrainingScript,
};

/// Raw body chunks of a generation response
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Opens generation jobs
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Submit a job and return its response body as a chunk stream
    ///
    /// An error here means the job never started (connection refused,
    /// non-success status, ...).
    async fn open_generation(&self, request: &GenerationRequest) -> Result<ChunkStream>;
}

/// Endpoints of the primary session store
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Create a session record, returning the store-issued id
    async fn create_session(&self, session: &NewSession) -> Result<String>;

    /// Write one script variant under a session
    async fn create_script(&self, session_id: &str, script: &ScriptRecord) -> Result<()>;

    /// Replace the content of a stored variant
    async fn update_script(&self, session_id: &str, script_number: usize, content: &str)
        -> Result<()>;

    /// Append a chat turn to a variant's thread
    async fn append_chat(
        &self,
        session_id: &str,
        script_number: usize,
        message: &ChatMessage,
    ) -> Result<()>;

    async fn list_sessions(&self) -> Result<Vec<RemoteSessionSummary>>;

    /// Fetch a full session; `Ok(None)` when the store has no such id
    async fn fetch_session(&self, session_id: &str) -> Result<Option<RemoteSession>>;

    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

/// Chat-edit endpoint
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn edit_script(&self, request: &ChatEditRequest) -> Result<ChatEditReply>;
}

/// Reference-script training endpoint
#[async_trait]
pub trait TrainingApi: Send + Sync {
    async fn train_script(&self, script: &TrainingScript) -> Result<TrainingReceipt>;
}
