//! Generation state and the event transition function
//!
//! [`StudioState::apply_event`] is the whole state machine: a pure function
//! from (state, event) to the next state. The async controller owns one of
//! these behind a mutex and feeds it decoded stream events.

use std::collections::BTreeMap;
use std::fmt;
use studio_client::{
    ChatMessage, GenerationRequest, HookRanking, NeedsInputKind, NormalizedResult, ScriptAngle,
    ScriptMode, StreamEvent,
};

use crate::chat::ChatThreads;
use crate::facts::FactSet;
use crate::session::{ScriptVariant, Session, SessionDraft, SessionId};

/// Lifecycle phase of the current job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Initializing,
    Researching,
    Drafting,
    Complete,
    Error,
    AwaitingClarification,
}

impl Phase {
    /// Phases in which a job is still streaming
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Initializing | Phase::Researching | Phase::Drafting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Initializing => "initializing",
            Phase::Researching => "researching",
            Phase::Drafting => "drafting",
            Phase::Complete => "complete",
            Phase::Error => "error",
            Phase::AwaitingClarification => "awaiting clarification",
        };
        f.write_str(name)
    }
}

/// A pending question from the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clarification {
    pub kind: NeedsInputKind,
    pub message: String,
    pub options: Vec<String>,
}

/// Why the last job ended in [`Phase::Error`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The service could not be reached or the stream broke
    Transport(String),
    /// The service reported an error event
    Backend(String),
}

/// What applying one event did to the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Completed,
    Suspended(Clarification),
    Failed(String),
}

/// Snapshot-able state of the studio
#[derive(Debug, Clone, Default)]
pub struct StudioState {
    pub phase: Phase,
    pub status: String,
    pub facts: FactSet,
    pub sources: Vec<String>,
    pub analysis: Option<String>,
    pub hook_ranking: Option<HookRanking>,
    pub angles: Vec<ScriptAngle>,
    pub scripts: Vec<String>,
    pub final_script: String,
    /// First-pass text when the service sent `{draft, optimized}`
    pub draft_script: Option<String>,
    /// Index into `scripts` of the variant on screen
    pub active_variant: usize,
    pub clarification: Option<Clarification>,
    pub failure: Option<Failure>,
    pub chat: ChatThreads,
    pub current_session: Option<SessionId>,

    pub topic: String,
    pub mode: ScriptMode,
    pub notes: String,
    pub skip_research: bool,
    pub last_request: Option<GenerationRequest>,

    /// Bumped by every submission, cancel and session load
    pub generation: u64,
    /// Stream records that failed to decode during the current job
    pub dropped_records: u64,
}

impl StudioState {
    pub fn new() -> Self {
        Self {
            status: "Ready".to_string(),
            ..Default::default()
        }
    }

    /// Clear the outputs of any previous job and start a new one
    pub fn begin(&mut self, request: &GenerationRequest) -> u64 {
        *self = Self {
            phase: Phase::Initializing,
            status: "Initializing...".to_string(),
            topic: request.topic.clone(),
            mode: request.mode,
            notes: request.notes.clone(),
            skip_research: request.skip_research,
            last_request: Some(request.clone()),
            generation: self.generation + 1,
            ..Default::default()
        };
        self.generation
    }

    /// Invalidate whatever job is in flight
    pub fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn apply_event(&mut self, event: StreamEvent) -> Transition {
        if self.phase == Phase::Idle {
            self.phase = Phase::Initializing;
        }
        match event {
            StreamEvent::Status { message } => self.status = message,
            StreamEvent::Research { data } => {
                self.facts.merge_block(&data);
                self.phase = Phase::Researching;
            }
            StreamEvent::Sources { data } => {
                self.sources = data;
                self.phase = Phase::Researching;
            }
            StreamEvent::Analysis { data } => {
                self.analysis = Some(data);
                self.phase = Phase::Drafting;
            }
            StreamEvent::HookRanking { data } => {
                self.hook_ranking = Some(data);
                self.phase = Phase::Drafting;
            }
            StreamEvent::Angles { data } => self.angles = data,
            StreamEvent::ScriptComplete { index, angle_name } => {
                self.status = match angle_name {
                    Some(name) if !name.is_empty() => {
                        format!("Script {} complete: {}", index, name)
                    }
                    _ => format!("Script {} complete", index),
                };
            }
            StreamEvent::Result { data } => {
                self.apply_result(data.normalize());
                self.phase = Phase::Complete;
                self.status = "Complete!".to_string();
                return Transition::Completed;
            }
            StreamEvent::NeedsInput {
                kind,
                message,
                options,
            } => {
                let clarification = Clarification {
                    kind,
                    message: message.clone(),
                    options,
                };
                self.clarification = Some(clarification.clone());
                self.phase = Phase::AwaitingClarification;
                self.status = message;
                return Transition::Suspended(clarification);
            }
            StreamEvent::Error { message } => {
                self.fail(Failure::Backend(message.clone()));
                return Transition::Failed(message);
            }
        }
        Transition::Continue
    }

    fn apply_result(&mut self, result: NormalizedResult) {
        if !result.angles.is_empty() {
            self.angles = result.angles;
        }
        self.chat.reset(result.scripts.len());
        self.scripts = result.scripts;
        self.final_script = result.final_script;
        self.draft_script = result.draft;
        self.active_variant = 0;
    }

    pub fn fail(&mut self, failure: Failure) {
        self.status = match &failure {
            Failure::Transport(_) => "Connection Failed".to_string(),
            Failure::Backend(message) => format!("Error: {}", message),
        };
        self.failure = Some(failure);
        self.phase = Phase::Error;
    }

    /// The stream ended without a terminal event
    pub fn finish_without_terminal(&mut self) {
        self.phase = Phase::Complete;
        self.status = "Complete!".to_string();
    }

    /// Angle for variant index `i`, falling back to a numbered name
    pub fn angle_for(&self, index: usize) -> ScriptAngle {
        self.angles
            .get(index)
            .cloned()
            .unwrap_or_else(|| ScriptAngle::fallback(index))
    }

    pub fn set_active_variant(&mut self, index: usize) -> bool {
        if index >= self.scripts.len() {
            return false;
        }
        self.active_variant = index;
        true
    }

    /// Replace variant `number` (1-based), keeping `final_script` in step for single-script jobs
    pub fn replace_script(&mut self, number: usize, content: &str) -> bool {
        let Some(slot) = number.checked_sub(1).and_then(|i| self.scripts.get_mut(i)) else {
            return false;
        };
        *slot = content.to_string();
        if self.scripts.len() == 1 {
            self.final_script = content.to_string();
        }
        true
    }

    /// Session payload for the current results, if there are any
    pub fn draft(&self) -> Option<SessionDraft> {
        if self.scripts.is_empty() {
            return None;
        }
        let variants = self
            .scripts
            .iter()
            .enumerate()
            .map(|(i, content)| ScriptVariant {
                number: i + 1,
                content: content.clone(),
                angle: self.angle_for(i),
            })
            .collect();

        Some(SessionDraft {
            topic: self.topic.clone(),
            mode: self.mode,
            notes: self.notes.clone(),
            research: self.facts.serialize(),
            sources: self.sources.clone(),
            skip_research: self.skip_research,
            variants,
        })
    }

    /// Show a stored session as if its job had just completed
    pub fn load_session(&mut self, session: Session) {
        let generation = self.generation + 1;
        let scripts: Vec<String> = session.variants.iter().map(|v| v.content.clone()).collect();
        let final_script = scripts.first().cloned().unwrap_or_default();
        let chat = ChatThreads::from_history(scripts.len(), session.chat_history);

        *self = Self {
            phase: Phase::Complete,
            status: format!("Loaded session: {}", session.topic),
            facts: FactSet::from_serialized(&session.research),
            sources: session.sources,
            angles: session.variants.into_iter().map(|v| v.angle).collect(),
            scripts,
            final_script,
            chat,
            current_session: Some(session.id),
            topic: session.topic,
            mode: session.mode,
            notes: session.notes,
            skip_research: session.skip_research,
            generation,
            ..Default::default()
        };
    }

    pub fn chat_thread(&self, number: usize) -> Option<&[ChatMessage]> {
        self.chat.thread(number)
    }

    pub fn chat_history(&self) -> &BTreeMap<usize, Vec<ChatMessage>> {
        self.chat.as_map()
    }
}
