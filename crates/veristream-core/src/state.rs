//! Per-claim verification report, rebuilt event by event.
//!
//! [`VerificationState::apply`] is the reducer. Each event kind has exactly one
//! merge policy:
//!
//! - progress: `step_start` replaces the current step, `step_complete` appends to
//!   `completed_steps` (duplicates kept) and refreshes totals.
//! - append: findings, evidence, subclaims, provenance and symbolic records are
//!   pushed in arrival order with no de-duplication.
//! - patch-by-id: `evidence_scored` and `subclaim_verdict` merge into an existing
//!   record; a patch whose target has not arrived yet is dropped.
//! - replace: single-valued sections are overwritten wholesale.
//!
//! Unknown kinds leave the state untouched.

use serde::{Deserialize, Serialize};

use crate::event::{EvidenceScored, SubclaimVerdict, VerificationEvent};
use crate::model::{
    CitationResult, CorrectedClaim, Evidence, Finding, OverallVerdict, Plausibility, Predicate,
    ProvenanceEdge, ProvenanceNode, Reconciliation, Record, RuleFiring, Subclaim,
    SymbolicConfidence, VerdictOverride,
};

/// What applying one event did to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    Changed,
    /// Changed, and the reasoning view should come to the front.
    FocusReasoning,
    /// A patch named a record that does not exist; nothing changed.
    MissingTarget { id: String },
    /// The event has no bearing on the report.
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationState {
    pub subclaims: Vec<Subclaim>,
    pub evidence: Vec<Evidence>,
    pub contradictions: Vec<Finding>,
    pub consistency_issues: Vec<Finding>,
    pub authority_conflicts: Vec<Finding>,
    pub restatements: Vec<Finding>,
    pub growth_verifications: Vec<Finding>,
    pub staleness_findings: Vec<Finding>,
    pub citation_results: Vec<CitationResult>,
    pub provenance_nodes: Vec<ProvenanceNode>,
    pub provenance_edges: Vec<ProvenanceEdge>,

    pub overall_verdict: Option<OverallVerdict>,
    pub reconciliation: Option<Reconciliation>,
    pub corrected_claim: Option<CorrectedClaim>,
    pub plausibility: Option<Plausibility>,
    pub entity_resolution: Option<Record>,
    pub normalization: Option<Record>,
    pub materiality: Option<Record>,
    pub risk_signals: Option<Record>,
    pub numerical_facts: Option<Vec<Record>>,
    pub number_dependencies: Option<Vec<Record>>,
    pub temporal_data: Option<Record>,
    pub intra_consistency_issues: Vec<Finding>,
    pub methodology_issues: Vec<Finding>,

    pub symbolic_predicates: Vec<Predicate>,
    pub symbolic_rule_firings: Vec<RuleFiring>,
    pub symbolic_proof_tree: Vec<Record>,
    pub symbolic_confidence: Option<SymbolicConfidence>,
    pub symbolic_verdict_override: Option<VerdictOverride>,

    pub current_step: Option<String>,
    pub step_label: Option<String>,
    pub completed_steps: Vec<String>,
    pub total_duration_ms: Option<u64>,
    pub total_sources: Option<u32>,
}

impl VerificationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one event into the report.
    pub fn apply(&mut self, event: &VerificationEvent) -> Reduction {
        use VerificationEvent as E;

        match event {
            E::StepStart(s) => {
                self.current_step = Some(s.step.clone());
                self.step_label = Some(s.display_label().to_string());
            }
            E::StepComplete(s) => {
                self.completed_steps.push(s.step.clone());
                self.set_totals(s.total_duration_ms, s.total_sources);
            }
            E::VerificationComplete(c) => {
                self.set_totals(c.total_duration_ms, c.total_sources);
            }

            E::Subclaim(s) => self.subclaims.push(s.clone()),
            E::EvidenceFound(e) => self.evidence.push(e.clone()),
            E::ContradictionDetected(f) => self.contradictions.push(f.clone()),
            E::ConsistencyIssue(f) => self.consistency_issues.push(f.clone()),
            E::AuthorityConflict(f) => self.authority_conflicts.push(f.clone()),
            E::ProvenanceNode(n) => self.provenance_nodes.push(n.clone()),
            E::ProvenanceEdge(e) => self.provenance_edges.push(e.clone()),
            E::RestatementDetected(f) => self.restatements.push(f.clone()),
            E::GrowthVerification(f) => self.growth_verifications.push(f.clone()),
            E::StalenessFinding(f) => self.staleness_findings.push(f.clone()),
            E::CitationVerified(c) => self.citation_results.push(c.clone()),
            E::IntraConsistencyIssue(f) => self.intra_consistency_issues.push(f.clone()),
            E::MethodologyIssue(f) => self.methodology_issues.push(f.clone()),
            E::SymbolicPredicate(p) => self.symbolic_predicates.push(p.clone()),
            E::SymbolicRuleFiring(r) => self.symbolic_rule_firings.push(r.clone()),

            E::EvidenceScored(patch) => return self.patch_evidence(patch),
            E::SubclaimVerdict(patch) => return self.patch_subclaim(patch),

            E::OverallVerdict(v) => self.overall_verdict = Some(v.clone()),
            E::Reconciliation(r) => self.reconciliation = Some(r.clone()),
            E::PlausibilityAssessment(p) => self.plausibility = Some(p.clone()),
            E::EntityResolution(r) => self.entity_resolution = Some(r.clone()),
            E::Normalization(r) => self.normalization = Some(r.clone()),
            E::Materiality(r) => self.materiality = Some(r.clone()),
            E::RiskSignals(r) => self.risk_signals = Some(r.clone()),
            E::CorrectedClaim(c) => self.corrected_claim = Some(c.clone()),
            E::NumericalFacts(n) => {
                self.numerical_facts = Some(n.facts.clone());
                self.number_dependencies = Some(n.dependencies.clone());
            }
            E::TemporalXbrl(r) => self.temporal_data = Some(r.clone()),
            E::SymbolicProofTree(t) => self.symbolic_proof_tree = t.steps.clone(),
            E::SymbolicConfidence(c) => {
                self.symbolic_confidence = Some(c.clone());
                return Reduction::FocusReasoning;
            }
            E::SymbolicVerdictOverride(o) => self.symbolic_verdict_override = Some(o.clone()),

            E::AgentReasoning(_) | E::Unknown { .. } => return Reduction::Ignored,
        }
        Reduction::Changed
    }

    /// The verdict to present: a symbolic override wins, then a reconciliation
    /// that changed the verdict, then the mechanical overall verdict.
    pub fn effective_verdict(&self) -> Option<&str> {
        if let Some(o) = &self.symbolic_verdict_override {
            return Some(&o.verdict);
        }
        if let Some(v) = self.reconciliation.as_ref().and_then(|r| r.override_verdict()) {
            return Some(v);
        }
        self.overall_verdict.as_ref().map(|v| v.verdict.as_str())
    }

    pub fn subclaim(&self, id: &str) -> Option<&Subclaim> {
        self.subclaims.iter().find(|s| s.id == id)
    }

    pub fn evidence_item(&self, id: &str) -> Option<&Evidence> {
        self.evidence.iter().find(|e| e.id == id)
    }

    fn set_totals(&mut self, duration_ms: Option<u64>, sources: Option<u32>) {
        if let Some(ms) = duration_ms {
            self.total_duration_ms = Some(ms);
        }
        if let Some(n) = sources {
            self.total_sources = Some(n);
        }
    }

    fn patch_evidence(&mut self, patch: &EvidenceScored) -> Reduction {
        let target = patch.target();
        let Some(ev) = self.evidence.iter_mut().find(|e| e.id == target) else {
            return Reduction::MissingTarget {
                id: target.to_string(),
            };
        };
        if let Some(q) = patch.quality_score {
            ev.quality_score = Some(q);
        }
        if let Some(t) = &patch.study_type {
            ev.study_type = Some(t.clone());
        }
        if let Some(s) = patch.supports_claim {
            ev.supports_claim = Some(s);
        }
        if let Some(a) = &patch.assessment {
            ev.assessment = Some(a.clone());
        }
        for (k, v) in &patch.extra {
            ev.extra.insert(k.clone(), v.clone());
        }
        Reduction::Changed
    }

    fn patch_subclaim(&mut self, patch: &SubclaimVerdict) -> Reduction {
        let target = patch.target();
        let Some(sc) = self.subclaims.iter_mut().find(|s| s.id == target) else {
            return Reduction::MissingTarget {
                id: target.to_string(),
            };
        };
        if let Some(v) = &patch.verdict {
            sc.verdict = Some(v.clone());
        }
        if let Some(c) = &patch.confidence {
            sc.confidence = Some(c.clone());
        }
        if let Some(s) = patch.confidence_score {
            sc.confidence_score = Some(s);
        }
        if let Some(b) = &patch.confidence_breakdown {
            sc.confidence_breakdown = Some(b.clone());
        }
        if let Some(s) = &patch.summary {
            sc.summary = Some(s.clone());
        }
        Reduction::Changed
    }
}

/// Pure form of [`VerificationState::apply`].
pub fn reduce(mut state: VerificationState, event: &VerificationEvent) -> VerificationState {
    state.apply(event);
    state
}
