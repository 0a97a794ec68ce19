//! NDJSON framing for the generation stream
//!
//! The service answers a generation request with one JSON object per line.
//! Chunk boundaries from the HTTP body are arbitrary, so a record (or even a
//! multi-byte character) can be split across chunks. [`RecordCodec`] buffers
//! bytes until a `\n` arrives and only then yields the record.
//!
//! # End of stream
//!
//! Bytes left over after the last `\n` are handled by a single [`TailPolicy`]:
//!
//! - [`TailPolicy::Flush`] (default): the remainder is yielded as a final,
//!   possibly truncated record. If it was cut mid-object the event decoder
//!   rejects it like any other malformed record.
//! - [`TailPolicy::Discard`]: the remainder is dropped.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::io;
use std::str::FromStr;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;

use crate::error::{Result, StudioError};

/// Largest record accepted before the stream is treated as broken
pub const DEFAULT_MAX_RECORD_LEN: usize = 4 * 1024 * 1024;

/// What to do with an unterminated remainder at end of stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailPolicy {
    #[default]
    Flush,
    Discard,
}

impl FromStr for TailPolicy {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flush" => Ok(TailPolicy::Flush),
            "discard" => Ok(TailPolicy::Discard),
            other => Err(StudioError::InvalidRequest(format!(
                "unknown tail policy '{}' (expected flush or discard)",
                other
            ))),
        }
    }
}

/// Splits a byte stream into newline-terminated text records
#[derive(Debug, Clone)]
pub struct RecordCodec {
    policy: TailPolicy,
    max_len: usize,
    /// Bytes of the buffer already scanned for a newline
    scanned: usize,
}

impl RecordCodec {
    pub fn new(policy: TailPolicy) -> Self {
        Self::with_max_len(policy, DEFAULT_MAX_RECORD_LEN)
    }

    pub fn with_max_len(policy: TailPolicy, max_len: usize) -> Self {
        Self {
            policy,
            max_len,
            scanned: 0,
        }
    }
}

impl Decoder for RecordCodec {
    type Item = String;
    type Error = StudioError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        loop {
            let newline = buf[self.scanned..].iter().position(|b| *b == b'\n');
            let Some(offset) = newline else {
                if buf.len() > self.max_len {
                    return Err(StudioError::ConnectionFailed(format!(
                        "stream record exceeds {} bytes",
                        self.max_len
                    )));
                }
                self.scanned = buf.len();
                return Ok(None);
            };

            let end = self.scanned + offset;
            self.scanned = 0;
            let line = buf.split_to(end + 1);
            let record = to_record(&line[..end]);
            if !record.is_empty() {
                return Ok(Some(record));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        if let Some(record) = self.decode(buf)? {
            return Ok(Some(record));
        }

        self.scanned = 0;
        if buf.is_empty() {
            return Ok(None);
        }

        let rest = buf.split();
        match self.policy {
            TailPolicy::Discard => {
                tracing::debug!(bytes = rest.len(), "discarding unterminated stream tail");
                Ok(None)
            }
            TailPolicy::Flush => {
                let record = to_record(&rest);
                Ok(Some(record).filter(|r| !r.is_empty()))
            }
        }
    }
}

fn to_record(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Turn a stream of body chunks into a stream of complete records
///
/// A chunk error ends the sequence with [`StudioError::ConnectionFailed`]
/// (or the original transport error, if the chunk stream produced one).
pub fn frame_records<S>(chunks: S, policy: TailPolicy) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = Result<Bytes>>,
{
    let reader = StreamReader::new(chunks.map(|chunk| chunk.map_err(io::Error::other)));
    FramedRead::new(reader, RecordCodec::new(policy)).map(|item| item.map_err(recover_transport_error))
}

/// Undo the `io::Error` wrapping `StreamReader` forces on chunk errors
fn recover_transport_error(err: StudioError) -> StudioError {
    match err {
        StudioError::Io(io_err) => match io_err.into_inner() {
            Some(inner) => match inner.downcast::<StudioError>() {
                Ok(original) => *original,
                Err(other) => StudioError::ConnectionFailed(other.to_string()),
            },
            None => StudioError::ConnectionFailed("stream read failed".to_string()),
        },
        other => other,
    }
}
