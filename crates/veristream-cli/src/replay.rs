//! Offline replay of a captured verification stream.
//!
//! The capture is the raw response body of one `/api/verify` call. It is fed
//! through the frame decoder in fixed-size chunks so frames straddle chunk
//! boundaries the way they do on the wire.

use std::path::Path;

use anyhow::Context;
use tracing::info;
use veristream_core::{
    Claim, ClaimBoard, ClaimId, FrameDecoder, StreamOutcome, StreamUpdate,
};

pub const DEFAULT_CHUNK_SIZE: usize = 64;

pub struct ReplaySummary {
    pub decoded: u64,
    pub dropped: u64,
}

/// Replay `capture` as the stream of a single claim on a fresh board.
pub fn replay_file(
    capture: &Path,
    claim_text: &str,
    chunk_size: usize,
) -> anyhow::Result<(ClaimBoard, ReplaySummary)> {
    let body = std::fs::read(capture)
        .with_context(|| format!("failed to read capture {}", capture.display()))?;
    info!(path = %capture.display(), bytes = body.len(), "replaying capture");
    Ok(replay_bytes(&body, claim_text, chunk_size))
}

pub fn replay_bytes(body: &[u8], claim_text: &str, chunk_size: usize) -> (ClaimBoard, ReplaySummary) {
    let id = ClaimId::from("claim-1");
    let mut board = ClaimBoard::new();
    board.load_claims(vec![Claim::new(id.clone(), claim_text)]);
    board.apply(StreamUpdate::Started(id.clone()));

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for chunk in body.chunks(chunk_size.max(1)) {
        frames.extend(decoder.push(chunk));
    }
    frames.extend(decoder.finish());

    for event in frames.into_iter().flatten() {
        board.apply(StreamUpdate::Event(id.clone(), event));
    }
    board.apply(StreamUpdate::Finished(id, StreamOutcome::Completed));

    let summary = ReplaySummary {
        decoded: decoder.decoded(),
        dropped: decoder.dropped(),
    };
    (board, summary)
}
