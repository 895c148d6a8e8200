//! Incremental parser for the `/check-stream` response body.
//!
//! The backend writes one record per line, `data: {json}\n`, as each
//! municipality finishes. Chunks from the transport are not aligned to
//! records, so complete lines are dispatched as they arrive and the trailing
//! partial line is carried over to the next chunk.

use futures::{Stream, StreamExt};
use std::fmt;
use std::ops::ControlFlow;

use crate::errors::AppError;
use crate::models::{MunicipalityResult, StreamEvent, Summary};

/// Prefix that marks an event record.
pub const EVENT_PREFIX: &str = "data: ";

/// Receives decoded stream events.
///
/// Returning `ControlFlow::Break` stops reading the stream.
pub trait StreamHandler {
    fn on_result(&mut self, result: MunicipalityResult) -> ControlFlow<()>;
    fn on_done(&mut self, summary: Summary) -> ControlFlow<()>;
}

/// How consumption of a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The transport signalled end-of-data.
    Closed,
    /// The handler asked to stop.
    Stopped,
}

/// Splits raw bytes into complete records and decodes them.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the events of every record it completed.
    ///
    /// Lines are split on raw bytes before UTF-8 decoding, so a multi-byte
    /// character cut by a chunk boundary is reassembled first.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(event) = decode_record(&self.buffer[start..end]) {
                events.push(event);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        events
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Decodes one complete line. Returns `None` for anything that is not a
/// well-formed event record.
pub fn decode_record(line: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.strip_suffix('\r').unwrap_or(&text);
    let payload = text.strip_prefix(EVENT_PREFIX)?;

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!("Skipping malformed stream record: {}", e);
            None
        }
    }
}

/// Reads `stream` to the end, dispatching events to `handler` in order.
///
/// Does not check that a `done` event was seen; that is the caller's job.
/// An unterminated final record is discarded.
pub async fn consume_stream<S, B, E, H>(stream: S, handler: &mut H) -> Result<StreamEnd, AppError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
    H: StreamHandler + ?Sized,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = LineDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| AppError::Connection(format!("Stream read failed: {}", e)))?;

        for event in decoder.feed(chunk.as_ref()) {
            let flow = match event {
                StreamEvent::Result { result } => handler.on_result(result),
                StreamEvent::Done { summary } => handler.on_done(summary),
            };
            if flow.is_break() {
                return Ok(StreamEnd::Stopped);
            }
        }
    }

    if decoder.pending() > 0 {
        tracing::debug!(
            "Stream closed with {} bytes of unterminated record, discarded",
            decoder.pending()
        );
    }

    Ok(StreamEnd::Closed)
}

/// Consumes the body of a `/check-stream` response.
pub async fn consume_response<H>(
    response: reqwest::Response,
    handler: &mut H,
) -> Result<StreamEnd, AppError>
where
    H: StreamHandler + ?Sized,
{
    consume_stream(response.bytes_stream(), handler).await
}
