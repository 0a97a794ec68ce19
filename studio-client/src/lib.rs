//! Client for the script studio generation service
//!
//! The service runs long, multi-phase generation jobs and reports progress as
//! newline-delimited JSON over a single chunked response. This crate covers
//! the wire side of that conversation:
//!
//! - [`framing`]: reassembles records from arbitrary body chunks
//! - [`message`]: decodes records into typed [`StreamEvent`]s
//! - [`transport`]: the generation, session-store, chat and training
//!   endpoints, as traits plus an HTTP implementation
//! - [`types`]: request, event and record types
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use studio_client::framing::{frame_records, TailPolicy};
//! use studio_client::message::{decode_events, Decoded};
//! use studio_client::transport::{GenerationTransport, HttpTransport, HttpTransportConfig};
//! use studio_client::GenerationRequest;
//!
//! # async fn example() -> studio_client::Result<()> {
//! let transport = HttpTransport::new(HttpTransportConfig::default())?;
//! let chunks = transport
//!     .open_generation(&GenerationRequest::new("ChatGPT 5 launch"))
//!     .await?;
//!
//! let events = decode_events(frame_records(chunks, TailPolicy::Flush));
//! futures::pin_mut!(events);
//! while let Some(item) = events.next().await {
//!     if let Decoded::Event(event) = item? {
//!         println!("{}", event.type_name());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod framing;
pub mod message;
pub mod transport;
pub mod types;

pub use error::{Result, StudioError};
pub use framing::TailPolicy;
pub use types::{
    Attachment, ChatEditReply, ChatEditRequest, ChatMessage, ChatRole, GenerationRequest,
    HookRanking, HookType, NeedsInputKind, NormalizedResult, ResultPayload, ScriptAngle,
    ScriptMode, StreamEvent, TrainingReceipt, TrainingScript,
};
