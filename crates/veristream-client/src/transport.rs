//! Seam between the scheduler and whatever opens verification streams.

use async_trait::async_trait;
use futures::stream::BoxStream;
use veristream_core::Claim;

use crate::ClientError;

/// Raw body chunks of one verification stream.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

#[async_trait]
pub trait VerifyTransport: Send + Sync {
    /// Open the event stream for one claim. A non-success response must be
    /// returned as an error before any chunk is produced.
    async fn open_stream(&self, claim: &Claim) -> Result<ChunkStream, ClientError>;
}
