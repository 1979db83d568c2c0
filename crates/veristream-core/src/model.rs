//! Claims and the structured records a verification stream carries.
//!
//! Records the projections need to read are typed; everything else the server
//! sends alongside them is kept verbatim in `extra` maps so nothing is lost
//! when a report is persisted.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::state::VerificationState;

/// An opaque structured record, kept exactly as the server sent it.
pub type Record = Map<String, Value>;

/// First string value found under any of `keys`.
fn extra_str<'a>(extra: &'a Record, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| extra.get(*k).and_then(Value::as_str))
}

// ── Claims ──

/// Stable identifier of a claim within one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(pub String);

impl ClaimId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClaimId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClaimId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Verifying,
    Done,
    Error,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// `done` and `error` end a claim's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Only pending claims, or claims whose last attempt failed, may be verified.
    pub fn can_verify(&self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }
}

/// A single factual assertion submitted for verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub original_text: String,
    pub normalized_text: String,
    #[serde(rename = "type", default)]
    pub claim_type: String,
    pub status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationState>,
}

impl Claim {
    pub fn new(id: impl Into<ClaimId>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            original_text: text.clone(),
            normalized_text: text,
            claim_type: String::new(),
            status: ClaimStatus::Pending,
            verification: None,
        }
    }

    /// The wording sent to the verifier: normalized if present, otherwise original.
    pub fn verification_text(&self) -> &str {
        if self.normalized_text.trim().is_empty() {
            &self.original_text
        } else {
            &self.normalized_text
        }
    }
}

// ── Subclaims and evidence ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subclaim {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: String,
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

/// Whether a piece of evidence backs the claim. On the wire this is
/// `true`, `false`, or the string `"partial"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    Supports,
    Contradicts,
    Partial,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supports => "supports",
            Self::Contradicts => "contradicts",
            Self::Partial => "partial",
        }
    }
}

impl Serialize for Stance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Supports => serializer.serialize_bool(true),
            Self::Contradicts => serializer.serialize_bool(false),
            Self::Partial => serializer.serialize_str("partial"),
        }
    }
}

impl<'de> Deserialize<'de> for Stance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Flag(bool),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Flag(true) => Ok(Self::Supports),
            Wire::Flag(false) => Ok(Self::Contradicts),
            Wire::Text(s) if s.eq_ignore_ascii_case("partial") => Ok(Self::Partial),
            Wire::Text(other) => Err(serde::de::Error::custom(format!(
                "unknown stance {other:?}, expected true, false or \"partial\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subclaim_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    /// Authority class of the source, e.g. `sec_filing`, `press_release`,
    /// `market_data`, `counter_evidence`.
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_claim: Option<Stance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    /// Ground-truth comparison fields and anything else the server attaches.
    #[serde(flatten)]
    pub extra: Record,
}

// ── Findings ──

/// One entry of a heterogeneous, append-only findings list (contradictions,
/// consistency issues, authority conflicts, restatements, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subclaim_id: Option<String>,
    /// A label (`"high"`) or a rank (`3`), depending on the analyser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Value>,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Record,
}

impl Finding {
    /// The finding's prose. Some analysers send it as `explanation`,
    /// `summary` or `message` instead of `description`.
    pub fn text(&self) -> &str {
        if !self.description.is_empty() {
            return &self.description;
        }
        extra_str(&self.extra, &["explanation", "summary", "message"]).unwrap_or_default()
    }

    pub fn severity_label(&self) -> Option<String> {
        match self.severity.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationResult {
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

// ── Provenance graph ──

/// How far a claim's meaning drifted at one provenance hop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationSeverity {
    #[default]
    None,
    Slight,
    Significant,
    Severe,
}

impl MutationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Slight => "slight",
            Self::Significant => "significant",
            Self::Severe => "severe",
        }
    }
}

/// Unrecognised or non-string severities read as `None` instead of failing
/// the whole node.
fn lenient_mutation<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MutationSeverity, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let severity = match value.as_str().map(str::to_ascii_lowercase).as_deref() {
        Some("slight") => MutationSeverity::Slight,
        Some("significant") => MutationSeverity::Significant,
        Some("severe") => MutationSeverity::Severe,
        _ => MutationSeverity::None,
    };
    Ok(severity)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_mutation")]
    pub mutation_severity: MutationSeverity,
    #[serde(flatten)]
    pub extra: Record,
}

impl ProvenanceNode {
    pub fn display_label(&self) -> &str {
        if !self.label.is_empty() {
            return &self.label;
        }
        extra_str(&self.extra, &["text"]).unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEdge {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl ProvenanceEdge {
    /// Edge ends; graph-style payloads name them `source` / `target`.
    pub fn source_id(&self) -> &str {
        if !self.from.is_empty() {
            return &self.from;
        }
        extra_str(&self.extra, &["source"]).unwrap_or_default()
    }

    pub fn target_id(&self) -> &str {
        if !self.to.is_empty() {
            return &self.to;
        }
        extra_str(&self.extra, &["target"]).unwrap_or_default()
    }
}

// ── Verdicts ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallVerdict {
    pub verdict: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_breakdown: Option<Record>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciled: Option<bool>,
}

/// Final-pass adjustment that may override the mechanically computed verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciled_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl Reconciliation {
    /// The reconciled verdict, if reconciliation actually changed it.
    pub fn override_verdict(&self) -> Option<&str> {
        let reconciled = self.reconciled_verdict.as_deref()?;
        match self.original_verdict.as_deref() {
            Some(original) if original == reconciled => None,
            _ => Some(reconciled),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plausibility {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectedClaim {
    #[serde(default)]
    pub corrected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl CorrectedClaim {
    pub fn text(&self) -> &str {
        if !self.corrected.is_empty() {
            return &self.corrected;
        }
        extra_str(&self.extra, &["corrected_claim", "text"]).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericalFacts {
    #[serde(default)]
    pub facts: Vec<Record>,
    #[serde(default)]
    pub dependencies: Vec<Record>,
}

// ── Symbolic reasoning overlay ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holds: Option<bool>,
    #[serde(flatten)]
    pub extra: Record,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| match a {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        write!(f, "{}({})", self.name, args.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleFiring {
    pub rule: String,
    #[serde(default)]
    pub premises: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProofTree {
    #[serde(default)]
    pub steps: Vec<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolicConfidence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl SymbolicConfidence {
    /// Confidence in `[0, 1]`, read from `confidence` or `score`.
    pub fn value(&self) -> Option<f64> {
        self.confidence
            .or_else(|| self.extra.get("score").and_then(Value::as_f64))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictOverride {
    pub verdict: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stance_accepts_bool_and_partial() {
        let s: Stance = serde_json::from_str("true").unwrap();
        assert_eq!(s, Stance::Supports);
        let s: Stance = serde_json::from_str("false").unwrap();
        assert_eq!(s, Stance::Contradicts);
        let s: Stance = serde_json::from_str("\"partial\"").unwrap();
        assert_eq!(s, Stance::Partial);
        assert!(serde_json::from_str::<Stance>("\"maybe\"").is_err());
    }

    #[test]
    fn stance_serializes_back_to_wire_shape() {
        assert_eq!(serde_json::to_string(&Stance::Partial).unwrap(), "\"partial\"");
        assert_eq!(serde_json::to_string(&Stance::Contradicts).unwrap(), "false");
    }

    #[test]
    fn evidence_keeps_ground_truth_fields() {
        let json = r#"{
            "id": "e1",
            "title": "10-K 2023",
            "tier": "sec_filing",
            "supports_claim": "partial",
            "ground_truth_value": 41.2,
            "claimed_value": 45.0
        }"#;
        let ev: Evidence = serde_json::from_str(json).unwrap();
        assert_eq!(ev.supports_claim, Some(Stance::Partial));
        assert_eq!(ev.extra.get("ground_truth_value"), Some(&Value::from(41.2)));
        assert!(ev.snippet.is_empty());
    }

    #[test]
    fn finding_reads_explanation_as_description() {
        let f: Finding =
            serde_json::from_str(r#"{"explanation": "revenue figures disagree", "severity": "high"}"#)
                .unwrap();
        assert_eq!(f.text(), "revenue figures disagree");
        assert_eq!(f.severity_label().as_deref(), Some("high"));
    }

    #[test]
    fn finding_with_both_prose_keys_and_numeric_severity() {
        let f: Finding = serde_json::from_str(
            r#"{"description": "10-K says 4.1B", "explanation": "press release says 4.5B", "severity": 3}"#,
        )
        .unwrap();
        assert_eq!(f.text(), "10-K says 4.1B");
        assert_eq!(f.severity_label().as_deref(), Some("3"));
        assert_eq!(
            f.extra.get("explanation"),
            Some(&Value::from("press release says 4.5B"))
        );
    }

    #[test]
    fn provenance_records_tolerate_alternate_keys() {
        let n: ProvenanceNode = serde_json::from_str(
            r#"{"id": "p1", "label": "Reuters", "text": "Reuters wire, 3 May", "mutation_severity": 2}"#,
        )
        .unwrap();
        assert_eq!(n.display_label(), "Reuters");
        assert_eq!(n.mutation_severity, MutationSeverity::None);

        let n: ProvenanceNode =
            serde_json::from_str(r#"{"id": "p2", "text": "blog post", "mutation_severity": "Severe"}"#)
                .unwrap();
        assert_eq!(n.display_label(), "blog post");
        assert_eq!(n.mutation_severity, MutationSeverity::Severe);

        let e: ProvenanceEdge =
            serde_json::from_str(r#"{"source": "p1", "target": "p2"}"#).unwrap();
        assert_eq!((e.source_id(), e.target_id()), ("p1", "p2"));
    }

    #[test]
    fn corrected_claim_and_confidence_fallbacks() {
        let c: CorrectedClaim = serde_json::from_str(
            r#"{"corrected_claim": "Revenue grew 32%", "text": "Revenue grew 40%"}"#,
        )
        .unwrap();
        assert_eq!(c.text(), "Revenue grew 32%");

        let s: SymbolicConfidence = serde_json::from_str(r#"{"score": 0.64}"#).unwrap();
        assert_eq!(s.value(), Some(0.64));
    }

    #[test]
    fn reconciliation_override_only_when_changed() {
        let same = Reconciliation {
            original_verdict: Some("supported".into()),
            reconciled_verdict: Some("supported".into()),
            ..Default::default()
        };
        assert_eq!(same.override_verdict(), None);

        let changed = Reconciliation {
            original_verdict: Some("contradicted".into()),
            reconciled_verdict: Some("partially_supported".into()),
            ..Default::default()
        };
        assert_eq!(changed.override_verdict(), Some("partially_supported"));
    }

    #[test]
    fn predicate_display() {
        let p = Predicate {
            name: "reported".into(),
            args: vec![Value::from("ACME"), Value::from(2023)],
            ..Default::default()
        };
        assert_eq!(p.to_string(), "reported(ACME, 2023)");
    }

    #[test]
    fn claim_status_rules() {
        assert!(ClaimStatus::Pending.can_verify());
        assert!(ClaimStatus::Error.can_verify());
        assert!(!ClaimStatus::Done.can_verify());
        assert!(!ClaimStatus::Verifying.can_verify());
        assert!(ClaimStatus::Error.is_terminal());
    }

    #[test]
    fn verification_text_falls_back_to_original() {
        let mut c = Claim::new("c1", "Revenue grew 40%");
        c.normalized_text.clear();
        assert_eq!(c.verification_text(), "Revenue grew 40%");
    }
}
