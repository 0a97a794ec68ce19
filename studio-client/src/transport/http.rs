//! HTTP implementation of the transport traits

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use std::time::Duration;

use super::{ChatApi, ChunkStream, GenerationTransport, SessionApi, TrainingApi};
use crate::error::{Result, StudioError};
use crate::types::{
    ChatEditReply, ChatEditRequest, ChatMessage, CreatedSession, GenerationRequest, NewSession,
    RemoteSession, RemoteSessionSummary, ScriptRecord, TrainingReceipt, TrainingScript,
};

/// Connection settings for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Service root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Whole-request timeout, including reading a generation stream to the end
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// reqwest-backed client for every service endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StudioError::ConnectionFailed(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn non-success responses into [`StudioError::Http`]
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(StudioError::Http {
            status: status.as_u16(),
            body,
        })
    }

    fn generation_form(request: &GenerationRequest) -> Result<Form> {
        let mut form = Form::new()
            .text("topic", request.topic.clone())
            .text("user_notes", request.notes.clone())
            .text("mode", request.mode.as_str())
            .text("skip_research", request.skip_research.to_string());

        for attachment in &request.attachments {
            let mut part = Part::bytes(attachment.bytes.clone()).file_name(attachment.file_name.clone());
            if let Some(content_type) = &attachment.content_type {
                part = part.mime_str(content_type).map_err(|e| {
                    StudioError::InvalidRequest(format!(
                        "bad content type for {}: {}",
                        attachment.file_name, e
                    ))
                })?;
            }
            form = form.part("files", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl GenerationTransport for HttpTransport {
    async fn open_generation(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        request.validate()?;
        let form = Self::generation_form(request)?;

        tracing::debug!(
            topic = %request.topic,
            mode = %request.mode,
            attachments = request.attachments.len(),
            "opening generation stream"
        );

        let response = self
            .client
            .post(self.url("/generate_stream"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StudioError::ConnectionFailed(e.to_string()))?;
        let response = Self::check(response).await?;

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StudioError::ConnectionFailed(e.to_string())));
        Ok(chunks.boxed())
    }
}

#[async_trait]
impl SessionApi for HttpTransport {
    async fn create_session(&self, session: &NewSession) -> Result<String> {
        let response = self
            .client
            .post(self.url("/sessions"))
            .json(session)
            .send()
            .await?;
        let created: CreatedSession = Self::check(response).await?.json().await?;
        Ok(created.id)
    }

    async fn create_script(&self, session_id: &str, script: &ScriptRecord) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{}/scripts", session_id)))
            .json(script)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_script(
        &self,
        session_id: &str,
        script_number: usize,
        content: &str,
    ) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("/sessions/{}/scripts/{}", session_id, script_number)))
            .json(&json!({ "script_content": content }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn append_chat(
        &self,
        session_id: &str,
        script_number: usize,
        message: &ChatMessage,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{}/chat", session_id)))
            .json(&json!({
                "script_number": script_number,
                "role": message.role,
                "content": message.content,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<RemoteSessionSummary>> {
        let response = self.client.get(self.url("/sessions")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<RemoteSession>> {
        let response = self
            .client
            .get(self.url(&format!("/sessions/{}", session_id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response).await?.json().await?))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/sessions/{}", session_id)))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatApi for HttpTransport {
    async fn edit_script(&self, request: &ChatEditRequest) -> Result<ChatEditReply> {
        let response = self
            .client
            .post(self.url("/chat"))
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl TrainingApi for HttpTransport {
    async fn train_script(&self, script: &TrainingScript) -> Result<TrainingReceipt> {
        script.validate()?;
        tracing::debug!(title = %script.title, hook_type = %script.hook_type, "uploading training script");
        let response = self
            .client
            .post(self.url("/train_script"))
            .json(script)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
