//! Payload shapes for persisting a finished analysis.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::board::ClaimBoard;
use crate::model::Claim;
use crate::reasoning::ReasoningEntry;
use crate::trace::TraceLine;

/// Body of a report save: the claims with their frozen verification state.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    pub claims: Vec<Claim>,
    pub generated_at: DateTime<Utc>,
}

/// Reasoning entries of one claim, for the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimReasoning {
    pub claim_id: String,
    pub entries: Vec<ReasoningEntry>,
}

/// Body of an audit-log export: claims, the full trace and all narration.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPayload {
    pub claims: Vec<Claim>,
    pub trace: Vec<TraceLine>,
    pub reasoning: Vec<ClaimReasoning>,
    pub generated_at: DateTime<Utc>,
}

impl ClaimBoard {
    pub fn report_payload(
        &self,
        title: Option<String>,
        source_type: Option<String>,
    ) -> ReportPayload {
        ReportPayload {
            title,
            source_type,
            claims: self.claims().to_vec(),
            generated_at: Utc::now(),
        }
    }

    pub fn audit_log_payload(&self) -> AuditLogPayload {
        let reasoning = self
            .claims()
            .iter()
            .filter_map(|c| {
                let view = self.view(&c.id)?;
                Some(ClaimReasoning {
                    claim_id: c.id.to_string(),
                    entries: view.reasoning.entries().to_vec(),
                })
            })
            .collect();
        AuditLogPayload {
            claims: self.claims().to_vec(),
            trace: self.trace().into_lines(),
            reasoning,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{StreamOutcome, StreamUpdate};
    use crate::event::{Envelope, VerificationEvent};
    use crate::model::ClaimId;
    use serde_json::json;

    #[test]
    fn report_payload_carries_verification_state() {
        let mut board = ClaimBoard::new();
        board.load_claims(vec![Claim::new("c1", "Revenue grew 40% in 2023")]);
        let id = ClaimId::from("c1");
        board.apply(StreamUpdate::Started(id.clone()));
        board.apply(StreamUpdate::Event(
            id.clone(),
            VerificationEvent::from_envelope(Envelope::new(
                "overall_verdict",
                json!({"verdict": "supported", "confidence": "high", "summary": "ok"}),
            ))
            .unwrap(),
        ));
        board.apply(StreamUpdate::Finished(id, StreamOutcome::Completed));

        let payload = board.report_payload(Some("Q4 letter".into()), None);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["title"], "Q4 letter");
        assert!(value.get("source_type").is_none());
        assert_eq!(value["claims"][0]["status"], "done");
        assert_eq!(
            value["claims"][0]["verification"]["overall_verdict"]["verdict"],
            "supported"
        );
    }

    #[test]
    fn audit_log_includes_trace_and_reasoning() {
        let mut board = ClaimBoard::new();
        board.load_claims(vec![Claim::new("c1", "x")]);
        let id = ClaimId::from("c1");
        board.apply(StreamUpdate::Started(id.clone()));
        board.apply(StreamUpdate::Event(
            id,
            VerificationEvent::from_envelope(Envelope::new(
                "agent_reasoning",
                json!({"agent": "a", "stage": "s", "message": "m"}),
            ))
            .unwrap(),
        ));
        let payload = board.audit_log_payload();
        assert_eq!(payload.trace.len(), 1);
        assert_eq!(payload.reasoning.len(), 1);
        assert_eq!(payload.reasoning[0].entries[0].message, "m");
    }
}
