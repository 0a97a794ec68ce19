//! Chat-edit sessions
//!
//! Every script variant has its own chat thread. A user message is sent to the
//! chat endpoint together with the variant's current content and angle; the
//! reply is appended to the thread and, when the service rewrote the script,
//! replaces the variant in place. Replies that arrive after a new generation
//! started are discarded.

use std::collections::BTreeMap;
use studio_client::{ChatEditRequest, ChatMessage};
use thiserror::Error;

use crate::controller::StudioController;

/// Assistant text shown when the chat endpoint fails
pub const CHAT_FAILURE_NOTICE: &str = "Sorry, I couldn't apply that edit. Please try again.";

/// Per-variant chat threads, keyed by 1-based variant number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatThreads {
    threads: BTreeMap<usize, Vec<ChatMessage>>,
}

impl ChatThreads {
    /// Empty threads for variants `1..=count`
    pub fn reset(&mut self, count: usize) {
        self.threads = (1..=count).map(|n| (n, Vec::new())).collect();
    }

    /// Threads for `count` variants, seeded from stored history
    ///
    /// History for variant numbers outside `1..=count` is dropped.
    pub fn from_history(count: usize, mut history: BTreeMap<usize, Vec<ChatMessage>>) -> Self {
        let threads = (1..=count)
            .map(|n| (n, history.remove(&n).unwrap_or_default()))
            .collect();
        Self { threads }
    }

    pub fn thread(&self, number: usize) -> Option<&[ChatMessage]> {
        self.threads.get(&number).map(Vec::as_slice)
    }

    /// Append to an existing thread; false if there is no such variant
    pub fn push(&mut self, number: usize, message: ChatMessage) -> bool {
        match self.threads.get_mut(&number) {
            Some(thread) => {
                thread.push(message);
                true
            }
            None => false,
        }
    }

    pub fn as_map(&self) -> &BTreeMap<usize, Vec<ChatMessage>> {
        &self.threads
    }
}

/// Why a chat message was not sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatRejected {
    #[error("message is empty")]
    EmptyMessage,
    #[error("no script variant {0}")]
    NoSuchVariant(usize),
    #[error("script variant {0} has no content to edit")]
    EmptyScript(usize),
    #[error("a chat request for variant {0} is already in flight")]
    Busy(usize),
}

/// Result of a chat turn that was sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Replied {
        reply: ChatMessage,
        script_updated: bool,
    },
    /// The endpoint failed; `notice` was appended to the thread instead
    Failed { notice: ChatMessage },
    /// A new generation started while waiting; nothing was applied
    Discarded,
}

/// Releases a variant's in-flight slot when dropped
struct InFlight<'a> {
    controller: &'a StudioController,
    number: usize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .controller
            .chat_in_flight()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.number);
    }
}

impl StudioController {
    pub async fn chat_thread(&self, number: usize) -> Option<Vec<ChatMessage>> {
        self.state().lock().await.chat_thread(number).map(<[_]>::to_vec)
    }

    /// Send a chat-edit message for variant `number` (1-based)
    pub async fn send_chat(&self, number: usize, message: &str) -> Result<ChatOutcome, ChatRejected> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatRejected::EmptyMessage);
        }

        let (request, user_message, generation, session, _guard) = {
            let mut state = self.state().lock().await;
            let script = number
                .checked_sub(1)
                .and_then(|i| state.scripts.get(i))
                .cloned()
                .ok_or(ChatRejected::NoSuchVariant(number))?;
            if script.trim().is_empty() {
                return Err(ChatRejected::EmptyScript(number));
            }

            let guard = self.claim_chat_slot(number)?;

            let angle = state.angle_for(number - 1);
            let user_message = ChatMessage::user(message);
            state.chat.push(number, user_message.clone());

            let request = ChatEditRequest {
                script,
                message: message.to_string(),
                script_number: number,
                angle_name: angle.name,
                angle_focus: angle.focus,
            };
            (
                request,
                user_message,
                state.generation,
                state.current_session.clone(),
                guard,
            )
        };

        tracing::debug!(script_number = number, "sending chat edit");
        let reply = self.chat_api().edit_script(&request).await;

        let outcome = {
            let mut state = self.state().lock().await;
            if state.generation != generation {
                tracing::debug!(script_number = number, "discarding chat reply from previous generation");
                return Ok(ChatOutcome::Discarded);
            }

            match reply {
                Ok(reply) => {
                    let assistant = ChatMessage::assistant(reply.response.clone());
                    state.chat.push(number, assistant.clone());
                    let replacement = reply.replacement().map(str::to_string);
                    if let Some(content) = &replacement {
                        state.replace_script(number, content);
                    }
                    (
                        ChatOutcome::Replied {
                            reply: assistant,
                            script_updated: replacement.is_some(),
                        },
                        replacement,
                    )
                }
                Err(err) => {
                    tracing::warn!(script_number = number, error = %err, "chat edit failed");
                    let notice = ChatMessage::assistant(CHAT_FAILURE_NOTICE);
                    state.chat.push(number, notice.clone());
                    (ChatOutcome::Failed { notice }, None)
                }
            }
        };

        let (outcome, replacement) = outcome;
        if let (Some(session), ChatOutcome::Replied { reply, .. }) = (&session, &outcome) {
            let sessions = self.sessions();
            sessions.append_chat(session, number, &user_message).await;
            sessions.append_chat(session, number, reply).await;
            if let Some(content) = &replacement {
                sessions.update_script(session, number, content).await;
            }
        }

        Ok(outcome)
    }

    fn claim_chat_slot(&self, number: usize) -> Result<InFlight<'_>, ChatRejected> {
        let mut in_flight = self
            .chat_in_flight()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(number) {
            return Err(ChatRejected::Busy(number));
        }
        Ok(InFlight {
            controller: self,
            number,
        })
    }
}
