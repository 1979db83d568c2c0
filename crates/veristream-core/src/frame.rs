//! Incremental decoder for the `data: {json}` framed verification stream.
//!
//! Frames are separated by a blank line. A frame counts only if its first line
//! starts with [`FRAME_PREFIX`]; comment or keep-alive frames are passed over.
//! Chunk boundaries may fall anywhere, including inside a multi-byte character,
//! so bytes are buffered until a full frame is available.

use thiserror::Error;
use tracing::debug;

use crate::event::{Envelope, VerificationEvent};

/// Marker preceding the JSON payload on a frame's first line.
pub const FRAME_PREFIX: &str = "data:";

const FRAME_SEPARATOR: &[u8] = b"\n\n";

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("payload for {kind} does not match its schema: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Buffers stream chunks and yields one result per complete data frame.
///
/// A malformed frame yields an `Err` for that frame only; decoding carries on
/// with the next one.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Length of `buf` already searched for a separator.
    scanned: usize,
    decoded: u64,
    dropped: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<VerificationEvent, FrameError>> {
        // CRLF streams are treated like LF streams.
        self.buf.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut out = Vec::new();
        // A separator may straddle the old tail and the new chunk.
        let mut from = self.scanned.saturating_sub(FRAME_SEPARATOR.len() - 1);
        while let Some(rel) = find(&self.buf[from..], FRAME_SEPARATOR) {
            let pos = from + rel;
            let frame: Vec<u8> = self.buf.drain(..pos + FRAME_SEPARATOR.len()).collect();
            if let Some(result) = self.decode(&frame[..pos]) {
                out.push(result);
            }
            from = 0;
        }
        self.scanned = self.buf.len();
        out
    }

    /// Flush whatever is left once the stream has closed. A trailing frame
    /// without its closing blank line is still decoded.
    pub fn finish(&mut self) -> Vec<Result<VerificationEvent, FrameError>> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        self.decode(&rest).into_iter().collect()
    }

    /// Frames successfully decoded so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Data frames dropped as malformed so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn decode(&mut self, frame: &[u8]) -> Option<Result<VerificationEvent, FrameError>> {
        let result = match std::str::from_utf8(frame) {
            Ok(text) => {
                let json = data_line(text)?;
                serde_json::from_str::<Envelope>(json)
                    .map_err(FrameError::InvalidJson)
                    .and_then(VerificationEvent::from_envelope)
            }
            Err(e) => Err(e.into()),
        };
        match &result {
            Ok(_) => self.decoded += 1,
            Err(e) => {
                self.dropped += 1;
                debug!(error = %e, "dropping malformed frame");
            }
        }
        Some(result)
    }
}

/// The JSON text of a data frame, or `None` for frames that carry no data.
fn data_line(frame: &str) -> Option<&str> {
    let first = frame.trim_start_matches('\n').lines().next()?;
    let rest = first.strip_prefix(FRAME_PREFIX)?;
    let json = rest.strip_prefix(' ').unwrap_or(rest).trim_end();
    if json.is_empty() { None } else { Some(json) }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
