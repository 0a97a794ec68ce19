//! Script studio
//!
//! Client-side controller for multi-phase script generation jobs: streams a
//! job's progress from the generation service, keeps research facts and script
//! variants in a single state model, asks the user when the service needs a
//! clarification, saves finished sessions (remote store with a local SQLite
//! fallback), runs per-variant chat edits and uploads reference scripts for
//! training.

pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod controller;
pub mod facts;
pub mod gateway;
pub mod session;
pub mod store;
pub mod training;

pub use chat::{ChatOutcome, ChatRejected, ChatThreads};
pub use config::StudioConfig;
pub use controller::{
    Clarification, ControllerError, Failure, JobOutcome, Phase, ProgressUpdate, StudioController,
    StudioState,
};
pub use facts::FactSet;
pub use gateway::{SessionGateway, LOCAL_SESSION_CAP};
pub use session::{Origin, Session, SessionDraft, SessionId, SessionSummary};
