//! Generation controller
//!
//! [`StudioController`] drives one generation job at a time: it opens the
//! stream, frames and decodes records, feeds events through
//! [`StudioState::apply_event`], and hands finished results to the session
//! gateway. Progress is broadcast to subscribers as [`ProgressUpdate`]s.
//!
//! Each submission bumps a generation counter. A streaming loop whose
//! generation is no longer current stops applying events and reports
//! [`JobOutcome::Superseded`], so a new submission never sees output from an
//! old one.

mod clarification;
mod state;

pub use state::{Clarification, Failure, Phase, StudioState, Transition};

use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use studio_client::framing::frame_records;
use studio_client::message::{decode_events, Decoded};
use studio_client::transport::{ChatApi, GenerationTransport};
use studio_client::{GenerationRequest, StudioError, TailPolicy};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use crate::gateway::SessionGateway;
use crate::session::{SessionId, SessionSummary};

/// Errors surfaced by controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no clarification pending (phase: {0})")]
    NotAwaitingClarification(Phase),

    #[error("clarification option must not be empty")]
    EmptyOption,

    #[error("no script variant at index {0}")]
    NoSuchVariant(usize),

    #[error(transparent)]
    Transport(#[from] StudioError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// How a call to [`StudioController::submit`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Results arrived; `session` is where they were saved
    Completed {
        variants: usize,
        session: Option<SessionId>,
    },
    /// The service asked a question; answer with [`StudioController::select_option`]
    NeedsInput(Clarification),
    /// The service reported an error event
    Failed(String),
    /// A newer submission, cancel or session load took over
    Superseded,
}

/// Progress notification sent after every state change of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub generation: u64,
    pub phase: Phase,
    pub status: String,
    pub facts: usize,
}

struct Inner {
    state: Mutex<StudioState>,
    generator: Arc<dyn GenerationTransport>,
    chat: Arc<dyn ChatApi>,
    sessions: SessionGateway,
    tail_policy: TailPolicy,
    progress_tx: broadcast::Sender<ProgressUpdate>,
    /// Variant numbers with a chat request in flight
    chat_in_flight: std::sync::Mutex<HashSet<usize>>,
}

/// Cheap-to-clone handle to the studio
#[derive(Clone)]
pub struct StudioController {
    inner: Arc<Inner>,
}

impl StudioController {
    pub fn new(
        generator: Arc<dyn GenerationTransport>,
        chat: Arc<dyn ChatApi>,
        sessions: SessionGateway,
        tail_policy: TailPolicy,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StudioState::new()),
                generator,
                chat,
                sessions,
                tail_policy,
                progress_tx,
                chat_in_flight: std::sync::Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Receive progress updates for subsequent jobs
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.inner.progress_tx.subscribe()
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> StudioState {
        self.inner.state.lock().await.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.lock().await.phase
    }

    pub(crate) fn chat_api(&self) -> &dyn ChatApi {
        self.inner.chat.as_ref()
    }

    pub(crate) fn sessions(&self) -> &SessionGateway {
        &self.inner.sessions
    }

    pub(crate) fn state(&self) -> &Mutex<StudioState> {
        &self.inner.state
    }

    pub(crate) fn chat_in_flight(&self) -> &std::sync::Mutex<HashSet<usize>> {
        &self.inner.chat_in_flight
    }

    fn publish(&self, state: &StudioState) {
        // no subscribers is fine
        let _ = self.inner.progress_tx.send(ProgressUpdate {
            generation: state.generation,
            phase: state.phase,
            status: state.status.clone(),
            facts: state.facts.len(),
        });
    }

    /// Run a generation job to its end
    ///
    /// Transport failures put the studio in [`Phase::Error`] and are returned
    /// as [`ControllerError::Transport`]; everything the service itself
    /// reports comes back as a [`JobOutcome`].
    pub async fn submit(&self, request: GenerationRequest) -> Result<JobOutcome, ControllerError> {
        request
            .validate()
            .map_err(|e| ControllerError::InvalidRequest(e.to_string()))?;

        let generation = {
            let mut state = self.inner.state.lock().await;
            let generation = state.begin(&request);
            self.publish(&state);
            generation
        };
        tracing::info!(
            generation,
            topic = %request.topic,
            mode = %request.mode,
            skip_research = request.skip_research,
            "starting generation"
        );

        let chunks = match self.inner.generator.open_generation(&request).await {
            Ok(chunks) => chunks,
            Err(err) => return self.fail_transport(generation, err).await,
        };

        let events = decode_events(frame_records(chunks, self.inner.tail_policy));
        futures::pin_mut!(events);

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(Decoded::Event(event)) => event,
                Ok(Decoded::Unknown) => continue,
                Ok(Decoded::Malformed(_)) => {
                    let mut state = self.inner.state.lock().await;
                    if state.generation != generation {
                        return Ok(JobOutcome::Superseded);
                    }
                    state.dropped_records += 1;
                    continue;
                }
                Err(err) => return self.fail_transport(generation, err).await,
            };

            let event_type = event.type_name();
            let transition = {
                let mut state = self.inner.state.lock().await;
                if state.generation != generation {
                    tracing::debug!(generation, event_type, "dropping event from superseded job");
                    return Ok(JobOutcome::Superseded);
                }
                let transition = state.apply_event(event);
                self.publish(&state);
                transition
            };
            tracing::debug!(generation, event_type, "applied stream event");

            match transition {
                Transition::Continue => {}
                Transition::Completed => return self.complete(generation).await,
                Transition::Suspended(clarification) => {
                    tracing::info!(generation, options = clarification.options.len(), "service asked for clarification");
                    return Ok(JobOutcome::NeedsInput(clarification));
                }
                Transition::Failed(message) => {
                    tracing::warn!(generation, error = %message, "generation failed");
                    return Ok(JobOutcome::Failed(message));
                }
            }
        }

        {
            let mut state = self.inner.state.lock().await;
            if state.generation != generation {
                return Ok(JobOutcome::Superseded);
            }
            tracing::debug!(generation, "stream ended without a terminal event");
            state.finish_without_terminal();
            self.publish(&state);
        }
        self.complete(generation).await
    }

    async fn fail_transport(
        &self,
        generation: u64,
        err: StudioError,
    ) -> Result<JobOutcome, ControllerError> {
        let mut state = self.inner.state.lock().await;
        if state.generation != generation {
            return Ok(JobOutcome::Superseded);
        }
        tracing::error!(generation, error = %err, "generation stream failed");
        state.fail(Failure::Transport(err.to_string()));
        self.publish(&state);
        Err(ControllerError::Transport(err))
    }

    /// Persist the results of a completed job
    async fn complete(&self, generation: u64) -> Result<JobOutcome, ControllerError> {
        let (draft, variants, dropped) = {
            let state = self.inner.state.lock().await;
            if state.generation != generation {
                tracing::debug!(generation, "results superseded before they were saved");
                return Ok(JobOutcome::Superseded);
            }
            (state.draft(), state.scripts.len(), state.dropped_records)
        };
        tracing::info!(generation, variants, dropped_records = dropped, "generation complete");

        let Some(draft) = draft else {
            return Ok(JobOutcome::Completed {
                variants: 0,
                session: None,
            });
        };

        let session = self.inner.sessions.persist(draft).await?;

        let mut state = self.inner.state.lock().await;
        if state.generation != generation {
            return Ok(JobOutcome::Superseded);
        }
        state.current_session = Some(session.clone());
        Ok(JobOutcome::Completed {
            variants,
            session: Some(session),
        })
    }

    /// Stop tracking the current job; its remaining output is ignored
    pub async fn abandon(&self) {
        let mut state = self.inner.state.lock().await;
        let generation = state.supersede();
        if state.phase.is_active() {
            state.phase = Phase::Idle;
            state.status = "Cancelled".to_string();
        }
        tracing::info!(generation, "current job abandoned");
        self.publish(&state);
    }

    /// Move the variant selector; fails for an out-of-range index
    pub async fn set_active_variant(&self, index: usize) -> Result<(), ControllerError> {
        let mut state = self.inner.state.lock().await;
        if state.set_active_variant(index) {
            Ok(())
        } else {
            Err(ControllerError::NoSuchVariant(index))
        }
    }

    pub async fn list_history(&self) -> Vec<SessionSummary> {
        self.inner.sessions.list_history().await
    }

    /// Show a stored session; returns false when no such session exists
    pub async fn load_session(&self, id: &SessionId) -> Result<bool, ControllerError> {
        let Some(session) = self.inner.sessions.load(id).await? else {
            return Ok(false);
        };
        let mut state = self.inner.state.lock().await;
        state.load_session(session);
        tracing::info!(session_id = %id, "session loaded");
        self.publish(&state);
        Ok(true)
    }

    pub async fn delete_session(&self, id: &SessionId) -> Result<bool, ControllerError> {
        let deleted = self.inner.sessions.delete(id).await?;
        if deleted {
            let mut state = self.inner.state.lock().await;
            if state.current_session.as_ref() == Some(id) {
                state.current_session = None;
            }
        }
        Ok(deleted)
    }
}
