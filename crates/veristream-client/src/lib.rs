//! Client side of veristream: the HTTP collaborator endpoints and the scheduler
//! that drives bounded-concurrency claim verification.

pub mod config;
mod error;
pub mod scheduler;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use scheduler::{RunSummary, Scheduler};
pub use transport::{ChunkStream, VerifyTransport};

#[cfg(feature = "http")]
pub use http::VeristreamClient;
