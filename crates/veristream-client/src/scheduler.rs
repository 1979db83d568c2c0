//! Bounded-concurrency verification of a claim list.
//!
//! Pending claims are split into batches of `max_concurrent_claims`. All
//! pipelines of a batch run side by side on the current task; the next batch
//! starts only once every claim of the current one has reached `done` or
//! `error`. Each pipeline opens its stream, feeds chunks through its own
//! [`FrameDecoder`] and sends decoded events over a bounded channel to the one
//! consumer that owns the [`ClaimBoard`], so board writes are never concurrent.

use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use veristream_core::{
    Claim, ClaimBoard, ClaimId, FrameDecoder, StreamOutcome, StreamUpdate, VerificationEvent,
};

use crate::transport::VerifyTransport;
use crate::{ClientConfig, ClientError};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Terminal counts for one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub done: usize,
    pub failed: usize,
}

pub struct Scheduler<T> {
    transport: T,
    max_concurrent: usize,
    idle_timeout: Duration,
}

impl<T: VerifyTransport> Scheduler<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            max_concurrent: config.max_concurrent_claims.max(1),
            idle_timeout: config.stream_idle_timeout,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Verify every `pending` claim on the board, batch by batch.
    pub async fn verify_pending(&self, board: &mut ClaimBoard) -> RunSummary {
        let pending = board.pending();
        let mut summary = RunSummary::default();
        if pending.is_empty() {
            return summary;
        }
        info!(
            claims = pending.len(),
            max_concurrent = self.max_concurrent,
            "verifying pending claims"
        );

        for (index, batch) in pending.chunks(self.max_concurrent).enumerate() {
            info!(batch = index, size = batch.len(), "batch started");
            let outcomes = self.run_batch(batch, board).await;
            summary.batches += 1;
            for outcome in outcomes {
                match outcome {
                    StreamOutcome::Completed => summary.done += 1,
                    StreamOutcome::Failed(_) => summary.failed += 1,
                }
            }
            info!(batch = index, "batch finished");
        }
        info!(done = summary.done, failed = summary.failed, "verification run finished");
        summary
    }

    /// Re-verify a single claim, e.g. after the user re-selects one that failed.
    /// Returns `None` when the claim is unknown or not in a verifiable state.
    pub async fn verify_claim(&self, board: &mut ClaimBoard, id: &ClaimId) -> Option<StreamOutcome> {
        let claim = board.claim(id).filter(|c| c.status.can_verify())?.clone();
        self.run_batch(std::slice::from_ref(&claim), board)
            .await
            .into_iter()
            .next()
    }

    async fn run_batch(&self, batch: &[Claim], board: &mut ClaimBoard) -> Vec<StreamOutcome> {
        let (tx, mut rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        let producer = async move {
            let pipelines = batch.iter().map(|claim| self.run_pipeline(claim, tx.clone()));
            // `tx` is dropped with this future, closing the channel.
            join_all(pipelines).await
        };
        let consumer = async {
            while let Some(update) = rx.recv().await {
                board.apply(update);
            }
        };

        let (outcomes, ()) = tokio::join!(producer, consumer);
        outcomes
    }

    /// One claim's read loop. Every exit path reports a terminal outcome.
    async fn run_pipeline(&self, claim: &Claim, tx: mpsc::Sender<StreamUpdate>) -> StreamOutcome {
        let id = claim.id.clone();
        if tx.send(StreamUpdate::Started(id.clone())).await.is_err() {
            return StreamOutcome::Failed("board closed".into());
        }

        let outcome = match self.read_stream(claim, &tx).await {
            Ok(()) => StreamOutcome::Completed,
            Err(e) => {
                warn!(claim_id = %id, error = %e, "verification stream failed");
                StreamOutcome::Failed(e.to_string())
            }
        };
        let _ = tx.send(StreamUpdate::Finished(id, outcome.clone())).await;
        outcome
    }

    async fn read_stream(
        &self,
        claim: &Claim,
        tx: &mpsc::Sender<StreamUpdate>,
    ) -> Result<(), ClientError> {
        // A rejected request fails here, before any decoder exists.
        let mut chunks = self.transport.open_stream(claim).await?;
        let mut decoder = FrameDecoder::new();

        loop {
            let next = tokio::time::timeout(self.idle_timeout, chunks.next())
                .await
                .map_err(|_| ClientError::Timeout {
                    what: "next stream chunk",
                })?;
            let Some(chunk) = next else {
                break;
            };
            forward(&claim.id, decoder.push(&chunk?), tx).await?;
        }
        forward(&claim.id, decoder.finish(), tx).await?;

        debug!(
            claim_id = %claim.id,
            decoded = decoder.decoded(),
            dropped = decoder.dropped(),
            "stream closed"
        );
        Ok(())
    }
}

async fn forward(
    id: &ClaimId,
    frames: Vec<Result<VerificationEvent, veristream_core::FrameError>>,
    tx: &mpsc::Sender<StreamUpdate>,
) -> Result<(), ClientError> {
    // Malformed frames were already logged by the decoder; skip them.
    for event in frames.into_iter().flatten() {
        tx.send(StreamUpdate::Event(id.clone(), event))
            .await
            .map_err(|_| ClientError::Stream("board closed".into()))?;
    }
    Ok(())
}
