//! Core types and projections for veristream: the claim model, the typed event
//! union, frame decoding, and the per-claim views rebuilt from a verification stream.

pub mod board;
pub mod event;
pub mod frame;
pub mod model;
pub mod reasoning;
pub mod report;
pub mod state;
pub mod trace;
pub mod tracker;

pub use board::{ClaimBoard, ClaimView, DisplayTab, StreamOutcome, StreamUpdate, Subscriber};
pub use event::{Envelope, VerificationEvent};
pub use frame::{FrameDecoder, FrameError};
pub use model::{Claim, ClaimId, ClaimStatus};
pub use reasoning::ReasoningFeed;
pub use report::{AuditLogPayload, ReportPayload};
pub use state::{Reduction, VerificationState};
pub use trace::{TraceLine, TraceLog};
pub use tracker::{AgentTracker, PipelineStats, PipelineTemplate};
