//! Decoding of stream records into [`StreamEvent`]s
//!
//! Decoding is pure. A record that is not a JSON object with a string `type`,
//! or a known type whose payload does not match, is a [`StudioError::Decode`].
//! A well-formed record with an unknown `type` decodes to `Ok(None)` so newer
//! services can add event kinds without breaking older clients.

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::{Result, StudioError};
use crate::types::StreamEvent;

/// Decode one record
pub fn parse_event(record: &str) -> Result<Option<StreamEvent>> {
    let value: Value = serde_json::from_str(record)
        .map_err(|e| StudioError::decode(format!("invalid json: {}", e), record))?;

    let event_type = match value.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(_) => return Err(StudioError::decode("`type` is not a string", record)),
        None => return Err(StudioError::decode("missing `type`", record)),
    };

    if !StreamEvent::KNOWN_TYPES.contains(&event_type.as_str()) {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| StudioError::decode(format!("bad `{}` payload: {}", event_type, e), record))
}

/// What a record turned into
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(StreamEvent),
    /// Well-formed record of a type this client does not know
    Unknown,
    /// Record that could not be decoded; the reason is kept for diagnostics
    Malformed(String),
}

/// Decode a stream of records, turning per-record failures into [`Decoded::Malformed`]
///
/// Transport errors from the record stream pass through unchanged and should
/// end consumption.
pub fn decode_events<S>(records: S) -> impl Stream<Item = Result<Decoded>>
where
    S: Stream<Item = Result<String>>,
{
    records.map(|record| {
        let record = record?;
        Ok(match parse_event(&record) {
            Ok(Some(event)) => Decoded::Event(event),
            Ok(None) => Decoded::Unknown,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed stream record");
                Decoded::Malformed(err.to_string())
            }
        })
    })
}
