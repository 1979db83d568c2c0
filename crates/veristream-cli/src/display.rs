//! Vertical card display for verified claims.
//!
//! Renders one claim's verification state as grouped, human-readable
//! sections, plus the session trace and a claim's reasoning feed.

use std::io::IsTerminal;

use veristream_core::model::{Evidence, Finding};
use veristream_core::{
    Claim, ClaimBoard, ClaimView, DisplayTab, ReasoningFeed, TraceLine, TraceLog,
    VerificationState,
};

const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

/// Print a single claim as a vertical card grouped by report section.
pub fn print_claim_card(claim: &Claim, view: Option<&ClaimView>) {
    println!("=== {} [{}] ===", claim.id, claim.status.as_str());
    println!("{}", claim.original_text);
    if claim.normalized_text != claim.original_text && !claim.normalized_text.is_empty() {
        println!("  {:<26} {}", "normalized", claim.normalized_text);
    }
    if !claim.claim_type.is_empty() {
        println!("  {:<26} {}", "type", claim.claim_type);
    }
    println!();

    let Some(state) = claim.verification.as_ref() else {
        return;
    };

    print_verdict(state);
    print_subclaims(state);
    print_evidence(&state.evidence);
    print_findings("Contradictions", &state.contradictions);
    print_findings("Consistency", &state.consistency_issues);
    print_findings("Intra-document consistency", &state.intra_consistency_issues);
    print_findings("Authority conflicts", &state.authority_conflicts);
    print_findings("Restatements", &state.restatements);
    print_findings("Growth checks", &state.growth_verifications);
    print_findings("Staleness", &state.staleness_findings);
    print_findings("Methodology", &state.methodology_issues);
    print_citations(state);
    print_provenance(state);
    print_symbolic(state);
    if let Some(view) = view {
        print_pipeline(view);
    }
}

/// Print every claim on the board with its reasoning feed, then the trace.
/// The reasoning feeds come first when the board has switched to them.
pub fn print_board(board: &ClaimBoard) {
    let reasoning_first = board.tab() == DisplayTab::Reasoning;
    if reasoning_first {
        print_all_reasoning(board);
    }
    for claim in board.claims() {
        print_claim_card(claim, board.view(&claim.id));
    }
    if !reasoning_first {
        print_all_reasoning(board);
    }
    print_trace(&board.trace());
}

fn print_all_reasoning(board: &ClaimBoard) {
    for claim in board.claims() {
        if let Some(view) = board.view(&claim.id) {
            print_reasoning(claim.id.as_str(), &view.reasoning);
        }
    }
}

pub fn print_trace(trace: &TraceLog) {
    if trace.is_empty() {
        return;
    }
    let colored = std::io::stdout().is_terminal();
    println!("Trace");
    for line in trace.lines() {
        println!("{}", format_trace_line(line, colored));
    }
    println!();
}

pub fn print_reasoning(claim_id: &str, feed: &ReasoningFeed) {
    if feed.is_empty() {
        return;
    }
    println!("Reasoning ({claim_id}, {} entries)", feed.len());
    for entry in feed.entries() {
        println!(
            "  {} [{}/{}] {}",
            entry.received_at.format("%H:%M:%S"),
            entry.agent,
            entry.stage,
            entry.message
        );
        if let Some(detail) = &entry.detail {
            println!("      {detail}");
        }
    }
    println!();
}

// ── Sections ──

fn print_verdict(state: &VerificationState) {
    let Some(verdict) = state.effective_verdict() else {
        if let Some(step) = state.step_label.as_deref().or(state.current_step.as_deref()) {
            println!("Progress");
            println!("  {:<26} {}", "current step", step);
            println!();
        }
        return;
    };

    println!("Verdict");
    println!("  {:<26} {}", "verdict", verdict);
    if let Some(overall) = &state.overall_verdict {
        if overall.verdict != verdict {
            println!("  {:<26} {}", "computed verdict", overall.verdict);
        }
        if !overall.confidence.is_empty() {
            println!("  {:<26} {}", "confidence", overall.confidence);
        }
        if let Some(score) = overall.confidence_score {
            println!("  {:<26} {:.2}", "confidence score", score);
        }
        if !overall.summary.is_empty() {
            println!("  {:<26} {}", "summary", overall.summary);
        }
    }
    if let Some(explanation) = state
        .reconciliation
        .as_ref()
        .and_then(|r| r.explanation.as_deref())
    {
        println!("  {:<26} {}", "reconciliation", explanation);
    }
    if let Some(corrected) = &state.corrected_claim {
        println!("  {:<26} {}", "corrected claim", corrected.text());
    }
    if let Some(score) = state.plausibility.as_ref().and_then(|p| p.score) {
        println!("  {:<26} {:.2}", "plausibility", score);
    }
    if let Some(ms) = state.total_duration_ms {
        println!("  {:<26} {:.1}s", "duration", ms as f64 / 1000.0);
    }
    if let Some(n) = state.total_sources {
        println!("  {:<26} {}", "sources", n);
    }
    println!();
}

fn print_subclaims(state: &VerificationState) {
    if state.subclaims.is_empty() {
        return;
    }
    println!("Subclaims ({})", state.subclaims.len());
    for s in state.subclaims.iter().take(MAX_LIST_ITEMS) {
        let verdict = s.verdict.as_deref().unwrap_or("pending");
        println!("  {:<26} {}", format!("{} [{}]", s.id, verdict), s.text);
    }
    print_overflow(state.subclaims.len());
    println!();
}

fn print_evidence(evidence: &[Evidence]) {
    if evidence.is_empty() {
        return;
    }
    println!("Evidence ({})", evidence.len());
    for e in evidence.iter().take(MAX_LIST_ITEMS) {
        let stance = e.supports_claim.map(|s| s.as_str()).unwrap_or("-");
        let score = e
            .quality_score
            .map(|q| format!("{q:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<26} {} ({}, q={}, {})",
            e.id, e.title, e.tier, score, stance
        );
    }
    print_overflow(evidence.len());
    println!();
}

fn print_findings(header: &str, findings: &[Finding]) {
    if findings.is_empty() {
        return;
    }
    println!("{header} ({})", findings.len());
    for f in findings.iter().take(MAX_LIST_ITEMS) {
        let severity = f.severity_label().unwrap_or_else(|| "-".to_string());
        println!("  {:<26} {}", severity, f.text());
    }
    print_overflow(findings.len());
    println!();
}

fn print_citations(state: &VerificationState) {
    if state.citation_results.is_empty() {
        return;
    }
    println!("Citations ({})", state.citation_results.len());
    for c in state.citation_results.iter().take(MAX_LIST_ITEMS) {
        println!("  {:<26} {}", c.status, c.citation);
    }
    print_overflow(state.citation_results.len());
    println!();
}

fn print_provenance(state: &VerificationState) {
    if state.provenance_nodes.is_empty() {
        return;
    }
    println!(
        "Provenance ({} nodes, {} edges)",
        state.provenance_nodes.len(),
        state.provenance_edges.len()
    );
    for n in state.provenance_nodes.iter().take(MAX_LIST_ITEMS) {
        println!(
            "  {:<26} {} (mutation: {})",
            n.id,
            n.display_label(),
            n.mutation_severity.as_str()
        );
    }
    print_overflow(state.provenance_nodes.len());
    for e in state.provenance_edges.iter().take(MAX_LIST_ITEMS) {
        println!("    {} -> {}", e.source_id(), e.target_id());
    }
    println!();
}

fn print_symbolic(state: &VerificationState) {
    let has_data = !state.symbolic_predicates.is_empty()
        || !state.symbolic_rule_firings.is_empty()
        || state.symbolic_confidence.is_some()
        || state.symbolic_verdict_override.is_some();
    if !has_data {
        return;
    }

    println!("Symbolic reasoning");
    if let Some(c) = state.symbolic_confidence.as_ref().and_then(|c| c.value()) {
        println!("  {:<26} {:.2}", "confidence", c);
    }
    if let Some(o) = &state.symbolic_verdict_override {
        let reason = o.reason.as_deref().unwrap_or("");
        println!("  {:<26} {} {}", "verdict override", o.verdict, reason);
    }
    if !state.symbolic_predicates.is_empty() {
        println!("  predicates ({}):", state.symbolic_predicates.len());
        for p in state.symbolic_predicates.iter().take(MAX_LIST_ITEMS) {
            println!("    {p}");
        }
        print_overflow(state.symbolic_predicates.len());
    }
    if !state.symbolic_rule_firings.is_empty() {
        println!("  rules fired ({}):", state.symbolic_rule_firings.len());
        for r in state.symbolic_rule_firings.iter().take(MAX_LIST_ITEMS) {
            match &r.conclusion {
                Some(c) => println!("    {} => {}", r.rule, c),
                None => println!("    {}", r.rule),
            }
        }
        print_overflow(state.symbolic_rule_firings.len());
    }
    println!();
}

fn print_pipeline(view: &ClaimView) {
    let stats = view.tracker.stats();
    if stats.steps == 0 {
        return;
    }
    let services: Vec<&str> = stats.services.iter().map(String::as_str).collect();
    println!("Pipeline");
    println!("  {:<26} {}", "steps", stats.steps);
    println!("  {:<26} {}", "api calls", stats.api_calls);
    println!("  {:<26} {}", "services", services.join(", "));
    println!("  {:<26} {}", "sources", stats.sources);
    println!("  {:<26} {}ms", "step time", stats.duration_ms);
    let running = running_chips(view);
    if !running.is_empty() {
        println!("  {:<26} {}", "running", running);
    }
    println!();
}

fn running_chips(view: &ClaimView) -> String {
    let labels: Vec<&str> = view.tracker.active().map(|c| c.label.as_str()).collect();
    labels.join(", ")
}

// ── Helpers ──

fn print_overflow(total: usize) {
    if let Some(line) = overflow_line(total) {
        println!("{line}");
    }
}

fn overflow_line(total: usize) -> Option<String> {
    (total > MAX_LIST_ITEMS).then(|| format!("    ... and {} more", total - MAX_LIST_ITEMS))
}

fn format_trace_line(line: &TraceLine, colored: bool) -> String {
    let indent = "  ".repeat(line.indent as usize + 1);
    let Some(badge) = line.badge else {
        return format!("{indent}{}", line.text);
    };
    let mut tag = format!("[{}]", badge.label());
    if colored {
        tag = paint(&tag, badge.color()).unwrap_or(tag);
    }
    format!("{indent}{} {tag}", line.text)
}

/// Wrap `text` in a 24-bit foreground escape for a `#rrggbb` color.
fn paint(text: &str, hex: &str) -> Option<String> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);
    Some(format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use veristream_core::trace::{Badge, TraceKind};

    #[test]
    fn overflow_only_past_the_cap() {
        assert_eq!(overflow_line(10), None);
        assert_eq!(overflow_line(13).as_deref(), Some("    ... and 3 more"));
    }

    #[test]
    fn trace_line_indents_and_badges() {
        let line = TraceLine {
            text: "Found: 10-K 2023".into(),
            kind: TraceKind::Success,
            indent: 1,
            badge: Some(Badge::Edgar),
        };
        assert_eq!(format_trace_line(&line, false), "    Found: 10-K 2023 [EDGAR]");
        assert_eq!(
            format_trace_line(&line, true),
            "    Found: 10-K 2023 \x1b[38;2;37;99;235m[EDGAR]\x1b[0m"
        );
    }

    #[test]
    fn malformed_color_leaves_text_plain() {
        assert_eq!(paint("x", "2563eb"), None);
        assert_eq!(paint("x", "#25g3eb"), None);
        assert_eq!(paint("x", "#fff"), None);
    }

    #[test]
    fn running_chips_follow_step_starts() {
        use veristream_core::{ClaimStatus, StreamUpdate, VerificationEvent};
        use veristream_core::event::Envelope;

        let mut board = ClaimBoard::new();
        board.load_claims(vec![Claim::new("c1", "Revenue grew 12%")]);
        let id = veristream_core::ClaimId::from("c1");
        board.apply(StreamUpdate::Started(id.clone()));
        let step = VerificationEvent::from_envelope(Envelope::new(
            "step_start",
            serde_json::json!({"step": "decomposition"}),
        ))
        .unwrap();
        board.apply(StreamUpdate::Event(id.clone(), step));

        assert_eq!(running_chips(board.view(&id).unwrap()), "Decomposition");
        assert_eq!(board.claim(&id).unwrap().status, ClaimStatus::Verifying);
    }
}
