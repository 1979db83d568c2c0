//! The typed event union carried by a verification stream.
//!
//! Each frame holds an [`Envelope`] `{"type": ..., "data": {...}}`. Turning the
//! envelope into a [`VerificationEvent`] is the only place the `type` string is
//! inspected; every projection matches on the enum instead. Kinds this build does
//! not know become [`VerificationEvent::Unknown`] so newer servers keep working.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::FrameError;
use crate::model::{
    CitationResult, CorrectedClaim, Evidence, Finding, NumericalFacts, OverallVerdict,
    Plausibility, Predicate, ProofTree, ProvenanceEdge, ProvenanceNode, Reconciliation, Record,
    RuleFiring, Stance, Subclaim, SymbolicConfidence, VerdictOverride,
};

/// Raw wire unit of the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

// ── Payloads that only exist on the wire ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStart {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl StepStart {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.step)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepComplete {
    pub step: String,
    /// Time spent in this step alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sources: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationComplete {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sources: Option<u32>,
}

/// Patch for an existing subclaim, matched on `subclaim_id` (or a bare `id`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubclaimVerdict {
    #[serde(default)]
    pub subclaim_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_breakdown: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Patch for existing evidence, matched on `evidence_id` (or a bare `id`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceScored {
    #[serde(default)]
    pub evidence_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_claim: Option<Stance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl SubclaimVerdict {
    pub fn target(&self) -> &str {
        patch_target(&self.subclaim_id, self.id.as_deref())
    }
}

impl EvidenceScored {
    pub fn target(&self) -> &str {
        patch_target(&self.evidence_id, self.id.as_deref())
    }
}

fn patch_target<'a>(named: &'a str, bare: Option<&'a str>) -> &'a str {
    if named.is_empty() { bare.unwrap_or_default() } else { named }
}

/// Free-text narration from one of the remote agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReasoning {
    pub agent: String,
    #[serde(default)]
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ── The union ──

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationEvent {
    // progress
    StepStart(StepStart),
    StepComplete(StepComplete),
    VerificationComplete(VerificationComplete),
    // append
    Subclaim(Subclaim),
    EvidenceFound(Evidence),
    ContradictionDetected(Finding),
    ConsistencyIssue(Finding),
    AuthorityConflict(Finding),
    ProvenanceNode(ProvenanceNode),
    ProvenanceEdge(ProvenanceEdge),
    RestatementDetected(Finding),
    GrowthVerification(Finding),
    StalenessFinding(Finding),
    CitationVerified(CitationResult),
    IntraConsistencyIssue(Finding),
    MethodologyIssue(Finding),
    SymbolicPredicate(Predicate),
    SymbolicRuleFiring(RuleFiring),
    // patch-by-id
    EvidenceScored(EvidenceScored),
    SubclaimVerdict(SubclaimVerdict),
    // replace
    OverallVerdict(OverallVerdict),
    Reconciliation(Reconciliation),
    PlausibilityAssessment(Plausibility),
    EntityResolution(Record),
    Normalization(Record),
    Materiality(Record),
    RiskSignals(Record),
    CorrectedClaim(CorrectedClaim),
    NumericalFacts(NumericalFacts),
    TemporalXbrl(Record),
    SymbolicProofTree(ProofTree),
    SymbolicConfidence(SymbolicConfidence),
    SymbolicVerdictOverride(VerdictOverride),
    // narration
    AgentReasoning(AgentReasoning),
    /// A kind this build does not recognise.
    Unknown { kind: String },
}

impl VerificationEvent {
    /// Decode a wire envelope. Unknown kinds are not an error; a known kind
    /// whose `data` does not fit its payload is.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, FrameError> {
        let Envelope { kind, data } = envelope;
        let event = match kind.as_str() {
            "step_start" => Self::StepStart(payload(&kind, data)?),
            "step_complete" => Self::StepComplete(payload(&kind, data)?),
            "verification_complete" => Self::VerificationComplete(payload(&kind, data)?),
            "subclaim" => Self::Subclaim(payload(&kind, data)?),
            "evidence_found" => Self::EvidenceFound(payload(&kind, data)?),
            "contradiction_detected" => Self::ContradictionDetected(payload(&kind, data)?),
            "consistency_issue" => Self::ConsistencyIssue(payload(&kind, data)?),
            "authority_conflict" => Self::AuthorityConflict(payload(&kind, data)?),
            "provenance_node" => Self::ProvenanceNode(payload(&kind, data)?),
            "provenance_edge" => Self::ProvenanceEdge(payload(&kind, data)?),
            "restatement_detected" => Self::RestatementDetected(payload(&kind, data)?),
            "growth_verification" => Self::GrowthVerification(payload(&kind, data)?),
            "staleness_finding" => Self::StalenessFinding(payload(&kind, data)?),
            "citation_verified" => Self::CitationVerified(payload(&kind, data)?),
            "intra_consistency_issue" => Self::IntraConsistencyIssue(payload(&kind, data)?),
            "methodology_issue" => Self::MethodologyIssue(payload(&kind, data)?),
            "symbolic_predicate" => Self::SymbolicPredicate(payload(&kind, data)?),
            "symbolic_rule_firing" => Self::SymbolicRuleFiring(payload(&kind, data)?),
            "evidence_scored" => Self::EvidenceScored(payload(&kind, data)?),
            "subclaim_verdict" => Self::SubclaimVerdict(payload(&kind, data)?),
            "overall_verdict" => Self::OverallVerdict(payload(&kind, data)?),
            "reconciliation" => Self::Reconciliation(payload(&kind, data)?),
            "plausibility_assessment" => Self::PlausibilityAssessment(payload(&kind, data)?),
            "entity_resolution" => Self::EntityResolution(payload(&kind, data)?),
            "normalization" => Self::Normalization(payload(&kind, data)?),
            "materiality" => Self::Materiality(payload(&kind, data)?),
            "risk_signals" => Self::RiskSignals(payload(&kind, data)?),
            "corrected_claim" => Self::CorrectedClaim(payload(&kind, data)?),
            "numerical_facts" => Self::NumericalFacts(payload(&kind, data)?),
            "temporal_xbrl" => Self::TemporalXbrl(payload(&kind, data)?),
            "symbolic_proof_tree" => Self::SymbolicProofTree(payload(&kind, data)?),
            "symbolic_confidence" => Self::SymbolicConfidence(payload(&kind, data)?),
            "symbolic_verdict_override" => Self::SymbolicVerdictOverride(payload(&kind, data)?),
            "agent_reasoning" => Self::AgentReasoning(payload(&kind, data)?),
            _ => Self::Unknown { kind },
        };
        Ok(event)
    }

    /// Parse a single JSON envelope, e.g. `{"type":"subclaim","data":{...}}`.
    pub fn from_json(json: &str) -> Result<Self, FrameError> {
        let envelope: Envelope = serde_json::from_str(json).map_err(FrameError::InvalidJson)?;
        Self::from_envelope(envelope)
    }

    /// The wire name of this event's kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::StepStart(_) => "step_start",
            Self::StepComplete(_) => "step_complete",
            Self::VerificationComplete(_) => "verification_complete",
            Self::Subclaim(_) => "subclaim",
            Self::EvidenceFound(_) => "evidence_found",
            Self::ContradictionDetected(_) => "contradiction_detected",
            Self::ConsistencyIssue(_) => "consistency_issue",
            Self::AuthorityConflict(_) => "authority_conflict",
            Self::ProvenanceNode(_) => "provenance_node",
            Self::ProvenanceEdge(_) => "provenance_edge",
            Self::RestatementDetected(_) => "restatement_detected",
            Self::GrowthVerification(_) => "growth_verification",
            Self::StalenessFinding(_) => "staleness_finding",
            Self::CitationVerified(_) => "citation_verified",
            Self::IntraConsistencyIssue(_) => "intra_consistency_issue",
            Self::MethodologyIssue(_) => "methodology_issue",
            Self::SymbolicPredicate(_) => "symbolic_predicate",
            Self::SymbolicRuleFiring(_) => "symbolic_rule_firing",
            Self::EvidenceScored(_) => "evidence_scored",
            Self::SubclaimVerdict(_) => "subclaim_verdict",
            Self::OverallVerdict(_) => "overall_verdict",
            Self::Reconciliation(_) => "reconciliation",
            Self::PlausibilityAssessment(_) => "plausibility_assessment",
            Self::EntityResolution(_) => "entity_resolution",
            Self::Normalization(_) => "normalization",
            Self::Materiality(_) => "materiality",
            Self::RiskSignals(_) => "risk_signals",
            Self::CorrectedClaim(_) => "corrected_claim",
            Self::NumericalFacts(_) => "numerical_facts",
            Self::TemporalXbrl(_) => "temporal_xbrl",
            Self::SymbolicProofTree(_) => "symbolic_proof_tree",
            Self::SymbolicConfidence(_) => "symbolic_confidence",
            Self::SymbolicVerdictOverride(_) => "symbolic_verdict_override",
            Self::AgentReasoning(_) => "agent_reasoning",
            Self::Unknown { kind } => kind,
        }
    }
}

/// Decode an event's `data`. A missing or null payload reads as `{}` so that
/// kinds whose fields are all optional still decode.
fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, FrameError> {
    let data = match data {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(data).map_err(|source| FrameError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}
