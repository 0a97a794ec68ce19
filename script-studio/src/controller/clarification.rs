//! Clarification sub-flow
//!
//! When the service pauses a job with `needs_input`, the user either picks an
//! option, which resubmits the original request with that option as its
//! topic, or cancels back to idle.

use super::{Clarification, ControllerError, JobOutcome, Phase, StudioController};

impl StudioController {
    pub async fn pending_clarification(&self) -> Option<Clarification> {
        self.state().lock().await.clarification.clone()
    }

    /// Answer the pending question and run the resumed job
    pub async fn select_option(&self, option: &str) -> Result<JobOutcome, ControllerError> {
        let option = option.trim();
        if option.is_empty() {
            return Err(ControllerError::EmptyOption);
        }

        let request = {
            let mut state = self.state().lock().await;
            if state.phase != Phase::AwaitingClarification {
                return Err(ControllerError::NotAwaitingClarification(state.phase));
            }
            let Some(previous) = state.last_request.as_ref() else {
                return Err(ControllerError::NotAwaitingClarification(state.phase));
            };
            let request = previous.with_topic(option);
            state.clarification = None;
            request
        };

        tracing::info!(topic = %request.topic, "resuming generation with clarified topic");
        self.submit(request).await
    }

    /// Dismiss the pending question without resubmitting
    pub async fn cancel_clarification(&self) -> Result<(), ControllerError> {
        let mut state = self.state().lock().await;
        if state.phase != Phase::AwaitingClarification {
            return Err(ControllerError::NotAwaitingClarification(state.phase));
        }
        state.supersede();
        state.clarification = None;
        state.phase = Phase::Idle;
        state.status = "Ready".to_string();
        tracing::info!("clarification cancelled");
        Ok(())
    }
}
