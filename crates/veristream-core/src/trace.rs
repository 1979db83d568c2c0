//! Flat, line-oriented transcript of verification streams for audit display.
//!
//! Only a curated subset of event kinds produce lines. Each kind has a fixed
//! icon, indentation (0 milestone, 1 detail, 2 nested detail) and, where one
//! upstream service is responsible, a badge naming it.

use serde::Serialize;

use crate::board::Subscriber;
use crate::event::VerificationEvent;
use crate::model::{Claim, Finding};

pub const CLAIM_TEXT_MAX: usize = 80;
pub const SUBCLAIM_TEXT_MAX: usize = 100;
pub const EVIDENCE_TITLE_MAX: usize = 50;
pub const FINDING_TEXT_MAX: usize = 120;
pub const SUMMARY_MAX: usize = 120;
pub const LABEL_MAX: usize = 60;

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Step,
    Success,
    Error,
    Verdict,
    Info,
    Divider,
}

/// Upstream service credited with producing a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Llm,
    Edgar,
    Xbrl,
    Market,
    Web,
    Rules,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Llm => "LLM",
            Self::Edgar => "EDGAR",
            Self::Xbrl => "XBRL",
            Self::Market => "MARKET",
            Self::Web => "WEB",
            Self::Rules => "RULES",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Llm => "#8b5cf6",
            Self::Edgar => "#2563eb",
            Self::Xbrl => "#3b82f6",
            Self::Market => "#10b981",
            Self::Web => "#f59e0b",
            Self::Rules => "#64748b",
        }
    }

    /// Badge for an evidence tier.
    pub fn for_tier(tier: &str) -> Option<Self> {
        match tier {
            "sec_filing" | "regulatory_filing" | "filing" => Some(Self::Edgar),
            "xbrl" => Some(Self::Xbrl),
            "market_data" => Some(Self::Market),
            "press_release" | "news" | "counter_evidence" | "web" => Some(Self::Web),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceLine {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: TraceKind,
    pub indent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
}

impl TraceLine {
    fn new(kind: TraceKind, indent: u8, text: String) -> Self {
        Self {
            text,
            kind,
            indent,
            badge: None,
        }
    }

    fn badge(mut self, badge: Option<Badge>) -> Self {
        self.badge = badge;
        self
    }
}

/// Truncate to at most `max` characters, appending an ellipsis only when
/// something was cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut out = text[..cut].to_string();
            out.push(ELLIPSIS);
            out
        }
        None => text.to_string(),
    }
}

/// Append-only transcript of one claim's verifications. A retried claim
/// keeps its earlier run above a divider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceLog {
    lines: Vec<TraceLine>,
    sections: usize,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[TraceLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<TraceLine> {
        self.lines
    }

    /// Concatenate per-claim transcripts in the given order, a divider
    /// between each non-empty one.
    pub fn join<'a>(logs: impl IntoIterator<Item = &'a TraceLog>) -> TraceLog {
        let mut joined = TraceLog::new();
        for log in logs.into_iter().filter(|l| !l.is_empty()) {
            if joined.sections > 0 {
                joined.push(TraceLine::new(TraceKind::Divider, 0, String::new()));
            }
            joined.sections += log.sections.max(1);
            joined.lines.extend(log.lines.iter().cloned());
        }
        joined
    }

    /// Open the transcript of a new claim verification, separated from the
    /// previous one by a divider.
    pub fn begin_claim(&mut self, claim: &Claim) {
        if self.sections > 0 {
            self.lines
                .push(TraceLine::new(TraceKind::Divider, 0, String::new()));
        }
        self.sections += 1;
        self.lines.push(TraceLine::new(
            TraceKind::Step,
            0,
            format!(
                "▶ Verifying claim: {}",
                truncate(claim.verification_text(), CLAIM_TEXT_MAX)
            ),
        ));
    }

    pub fn claim_failed(&mut self, reason: &str) {
        self.lines.push(TraceLine::new(
            TraceKind::Error,
            0,
            format!("✗ Verification failed: {}", truncate(reason, SUMMARY_MAX)),
        ));
    }

    fn push(&mut self, line: TraceLine) {
        self.lines.push(line);
    }

    fn finding(&mut self, kind: TraceKind, icon: &str, title: &str, f: &Finding, badge: Badge) {
        let mut text = format!("{icon} {title}: {}", truncate(f.text(), FINDING_TEXT_MAX));
        if let Some(sev) = f.severity_label() {
            text.push_str(&format!(" [{sev}]"));
        }
        self.push(TraceLine::new(kind, 1, text).badge(Some(badge)));
    }
}

impl Subscriber for TraceLog {
    fn on_event(&mut self, event: &VerificationEvent) {
        use VerificationEvent as E;

        match event {
            E::StepStart(s) => self.push(TraceLine::new(
                TraceKind::Step,
                0,
                format!("▶ {}", s.display_label()),
            )),
            E::StepComplete(s) => {
                let text = match s.duration_ms {
                    Some(ms) => format!("✓ {} complete ({ms} ms)", s.step),
                    None => format!("✓ {} complete", s.step),
                };
                self.push(TraceLine::new(TraceKind::Success, 0, text));
            }
            E::VerificationComplete(c) => {
                let mut text = "✓ Verification complete".to_string();
                if let Some(n) = c.total_sources {
                    text.push_str(&format!(" · {n} sources"));
                }
                if let Some(ms) = c.total_duration_ms {
                    text.push_str(&format!(" · {ms} ms"));
                }
                self.push(TraceLine::new(TraceKind::Success, 0, text));
            }

            E::Subclaim(s) => self.push(
                TraceLine::new(
                    TraceKind::Info,
                    1,
                    format!("◦ Subclaim {}: {}", s.id, truncate(&s.text, SUBCLAIM_TEXT_MAX)),
                )
                .badge(Some(Badge::Llm)),
            ),
            E::SubclaimVerdict(v) => {
                let verdict = v.verdict.as_deref().unwrap_or("pending");
                let text = match &v.confidence {
                    Some(c) => format!("→ {}: {verdict} ({c})", v.target()),
                    None => format!("→ {}: {verdict}", v.target()),
                };
                self.push(TraceLine::new(TraceKind::Verdict, 2, text));
            }
            E::EvidenceFound(e) => {
                let tier = if e.tier.is_empty() { "source" } else { e.tier.as_str() };
                self.push(
                    TraceLine::new(
                        TraceKind::Info,
                        1,
                        format!("+ [{tier}] {}", truncate(&e.title, EVIDENCE_TITLE_MAX)),
                    )
                    .badge(Badge::for_tier(&e.tier)),
                );
            }
            E::EvidenceScored(p) => {
                let mut text = format!("scored {}", p.target());
                if let Some(q) = p.quality_score {
                    text.push_str(&format!(" · quality {q:.2}"));
                }
                if let Some(s) = p.supports_claim {
                    text.push_str(&format!(" · {}", s.as_str()));
                }
                self.push(TraceLine::new(TraceKind::Info, 2, text));
            }

            E::ContradictionDetected(f) => {
                self.finding(TraceKind::Error, "⚠", "Contradiction", f, Badge::Llm)
            }
            E::ConsistencyIssue(f) => {
                self.finding(TraceKind::Error, "⚠", "Consistency issue", f, Badge::Llm)
            }
            E::IntraConsistencyIssue(f) => {
                self.finding(TraceKind::Error, "⚠", "Internal inconsistency", f, Badge::Llm)
            }
            E::MethodologyIssue(f) => {
                self.finding(TraceKind::Error, "⚠", "Methodology issue", f, Badge::Llm)
            }
            E::AuthorityConflict(f) => {
                self.finding(TraceKind::Error, "⚠", "Authority conflict", f, Badge::Edgar)
            }
            E::RestatementDetected(f) => {
                self.finding(TraceKind::Error, "↺", "Restatement", f, Badge::Edgar)
            }
            E::GrowthVerification(f) => {
                self.finding(TraceKind::Info, "∆", "Growth check", f, Badge::Xbrl)
            }
            E::StalenessFinding(f) => {
                self.finding(TraceKind::Info, "⏱", "Staleness", f, Badge::Web)
            }
            E::CitationVerified(c) => self.push(
                TraceLine::new(
                    TraceKind::Info,
                    1,
                    format!("§ Citation {}: {}", c.status, truncate(&c.citation, CLAIM_TEXT_MAX)),
                )
                .badge(Some(Badge::Web)),
            ),
            E::ProvenanceNode(n) => self.push(
                TraceLine::new(
                    TraceKind::Info,
                    1,
                    format!(
                        "⇢ {} [{}]",
                        truncate(n.display_label(), LABEL_MAX),
                        n.mutation_severity.as_str()
                    ),
                )
                .badge(Some(Badge::Web)),
            ),

            E::OverallVerdict(v) => {
                let text = if v.confidence.is_empty() {
                    format!("⚖ Verdict: {}", v.verdict)
                } else {
                    format!("⚖ Verdict: {} ({})", v.verdict, v.confidence)
                };
                self.push(TraceLine::new(TraceKind::Verdict, 0, text));
                if !v.summary.is_empty() {
                    self.push(TraceLine::new(
                        TraceKind::Info,
                        1,
                        truncate(&v.summary, SUMMARY_MAX),
                    ));
                }
            }
            E::Reconciliation(r) => {
                if let Some(new) = r.override_verdict() {
                    let old = r.original_verdict.as_deref().unwrap_or("?");
                    self.push(TraceLine::new(
                        TraceKind::Verdict,
                        1,
                        format!("⟲ Reconciled: {old} → {new}"),
                    ));
                }
            }
            E::CorrectedClaim(c) => self.push(TraceLine::new(
                TraceKind::Info,
                1,
                format!("✎ Corrected claim: {}", truncate(c.text(), FINDING_TEXT_MAX)),
            )),
            E::PlausibilityAssessment(p) => {
                let text = match (p.score, &p.assessment) {
                    (Some(s), Some(a)) => format!("Plausibility {s:.2}: {}", truncate(a, SUMMARY_MAX)),
                    (Some(s), None) => format!("Plausibility {s:.2}"),
                    (None, Some(a)) => format!("Plausibility: {}", truncate(a, SUMMARY_MAX)),
                    (None, None) => "Plausibility assessed".to_string(),
                };
                self.push(TraceLine::new(TraceKind::Info, 1, text).badge(Some(Badge::Llm)));
            }
            E::EntityResolution(r) => {
                let name = r
                    .get("entity")
                    .or_else(|| r.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("entity");
                self.push(
                    TraceLine::new(
                        TraceKind::Info,
                        1,
                        format!("Entity resolved: {}", truncate(name, LABEL_MAX)),
                    )
                    .badge(Some(Badge::Edgar)),
                );
            }
            E::TemporalXbrl(_) => self.push(
                TraceLine::new(TraceKind::Info, 1, "XBRL period data received".to_string())
                    .badge(Some(Badge::Xbrl)),
            ),
            E::SymbolicRuleFiring(r) => {
                let text = match &r.conclusion {
                    Some(c) => format!("rule {} ⊢ {}", r.rule, truncate(c, LABEL_MAX)),
                    None => format!("rule {} fired", r.rule),
                };
                self.push(TraceLine::new(TraceKind::Info, 2, text).badge(Some(Badge::Rules)));
            }
            E::SymbolicConfidence(c) => {
                let text = match c.value() {
                    Some(v) => format!("⊢ Symbolic confidence {:.0}%", v * 100.0),
                    None => "⊢ Symbolic confidence computed".to_string(),
                };
                self.push(TraceLine::new(TraceKind::Info, 1, text).badge(Some(Badge::Rules)));
            }
            E::SymbolicVerdictOverride(o) => self.push(
                TraceLine::new(
                    TraceKind::Verdict,
                    1,
                    format!("⊢ Symbolic override: {}", o.verdict),
                )
                .badge(Some(Badge::Rules)),
            ),

            E::ProvenanceEdge(_)
            | E::SymbolicPredicate(_)
            | E::SymbolicProofTree(_)
            | E::Normalization(_)
            | E::Materiality(_)
            | E::RiskSignals(_)
            | E::NumericalFacts(_)
            | E::AgentReasoning(_)
            | E::Unknown { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Envelope;
    use serde_json::{Value, json};

    fn ev(kind: &str, data: Value) -> VerificationEvent {
        VerificationEvent::from_envelope(Envelope::new(kind, data)).unwrap()
    }

    #[test]
    fn truncate_marks_only_when_cut() {
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("exactly", 7), "exactly");
        assert_eq!(truncate("exactly!", 7), "exactly…");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let s = "é".repeat(60);
        let t = truncate(&s, 50);
        assert_eq!(t.chars().count(), 51);
        assert!(t.ends_with(ELLIPSIS));
    }

    #[test]
    fn long_evidence_title_is_cut_to_fifty() {
        let title = "x".repeat(200);
        let mut log = TraceLog::new();
        log.on_event(&ev(
            "evidence_found",
            json!({"id": "e1", "title": title, "tier": "sec_filing"}),
        ));
        let line = &log.lines()[0];
        let shown = line.text.strip_prefix("+ [sec_filing] ").unwrap();
        assert_eq!(shown.chars().count(), 51);
        assert_eq!(shown.chars().filter(|&c| c == 'x').count(), 50);
        assert!(shown.ends_with(ELLIPSIS));
        assert_eq!(line.indent, 1);
        assert_eq!(line.badge, Some(Badge::Edgar));
    }

    #[test]
    fn divider_between_claims_only() {
        let mut log = TraceLog::new();
        log.begin_claim(&Claim::new("c1", "first"));
        log.on_event(&ev("step_start", json!({"step": "decomposition"})));
        log.begin_claim(&Claim::new("c2", "second"));
        let kinds: Vec<TraceKind> = log.lines().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![TraceKind::Step, TraceKind::Step, TraceKind::Divider, TraceKind::Step]
        );
    }

    #[test]
    fn join_keeps_each_log_contiguous() {
        let mut a = TraceLog::new();
        a.begin_claim(&Claim::new("c1", "first"));
        a.on_event(&ev("step_start", json!({"step": "decomposition"})));
        let mut b = TraceLog::new();
        b.begin_claim(&Claim::new("c2", "second"));
        b.claim_failed("reset by peer");
        let empty = TraceLog::new();

        let joined = TraceLog::join([&a, &empty, &b]);
        let texts: Vec<&str> = joined.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "▶ Verifying claim: first",
                "▶ decomposition",
                "",
                "▶ Verifying claim: second",
                "✗ Verification failed: reset by peer",
            ]
        );
        assert_eq!(joined.lines()[2].kind, TraceKind::Divider);
        assert!(TraceLog::join([&empty]).is_empty());
    }

    #[test]
    fn verdict_emits_milestone_and_summary() {
        let mut log = TraceLog::new();
        log.on_event(&ev(
            "overall_verdict",
            json!({"verdict": "supported", "confidence": "high", "summary": "Matches the 10-K."}),
        ));
        assert_eq!(log.lines().len(), 2);
        assert_eq!(log.lines()[0].text, "⚖ Verdict: supported (high)");
        assert_eq!(log.lines()[0].indent, 0);
        assert_eq!(log.lines()[1].indent, 1);
    }

    #[test]
    fn uncurated_kinds_produce_no_lines() {
        let mut log = TraceLog::new();
        log.on_event(&ev("provenance_edge", json!({"from": "a", "to": "b"})));
        log.on_event(&ev("agent_reasoning", json!({"agent": "x", "message": "y"})));
        log.on_event(&ev("mystery", json!({})));
        assert!(log.is_empty());
    }

    #[test]
    fn findings_carry_severity_and_badge() {
        let mut log = TraceLog::new();
        log.on_event(&ev(
            "authority_conflict",
            json!({"description": "10-Q and press release disagree", "severity": "high"}),
        ));
        let line = &log.lines()[0];
        assert_eq!(line.kind, TraceKind::Error);
        assert_eq!(line.badge, Some(Badge::Edgar));
        assert!(line.text.ends_with("[high]"));
    }

    #[test]
    fn unchanged_reconciliation_is_silent() {
        let mut log = TraceLog::new();
        log.on_event(&ev(
            "reconciliation",
            json!({"original_verdict": "supported", "reconciled_verdict": "supported"}),
        ));
        assert!(log.is_empty());
    }
}
