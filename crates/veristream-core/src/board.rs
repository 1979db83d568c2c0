//! The claim board: every claim of the current analysis plus the views each
//! claim's stream feeds.
//!
//! Updates arrive as [`StreamUpdate`]s tagged with a claim id. One event is
//! published to the claim's report and to the projections in its
//! [`ClaimView`]. All writes go through the claim id, so streams running side
//! by side never touch each other's state, trace lines included.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::event::VerificationEvent;
use crate::model::{Claim, ClaimId, ClaimStatus};
use crate::reasoning::ReasoningFeed;
use crate::state::{Reduction, VerificationState};
use crate::trace::TraceLog;
use crate::tracker::{AgentTracker, PipelineTemplate};

/// A projection fed by the verification stream.
pub trait Subscriber {
    fn on_event(&mut self, event: &VerificationEvent);
}

impl Subscriber for VerificationState {
    fn on_event(&mut self, event: &VerificationEvent) {
        self.apply(event);
    }
}

/// Publish one event to every subscriber, in order.
pub fn publish(event: &VerificationEvent, subscribers: &mut [&mut dyn Subscriber]) {
    for s in subscribers.iter_mut() {
        s.on_event(event);
    }
}

/// How a claim's stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Verification of the claim has begun.
    Started(ClaimId),
    Event(ClaimId, VerificationEvent),
    Finished(ClaimId, StreamOutcome),
}

/// Which panel of the report is in front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayTab {
    #[default]
    Report,
    Reasoning,
    Trace,
}

/// Per-claim views other than the report itself.
#[derive(Debug, Clone)]
pub struct ClaimView {
    pub tracker: AgentTracker,
    pub reasoning: ReasoningFeed,
    pub trace: TraceLog,
}

#[derive(Debug)]
pub struct ClaimBoard {
    claims: Vec<Claim>,
    views: HashMap<ClaimId, ClaimView>,
    tab: DisplayTab,
    template: Arc<PipelineTemplate>,
}

impl Default for ClaimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimBoard {
    pub fn new() -> Self {
        Self::with_template(PipelineTemplate::standard())
    }

    pub fn with_template(template: PipelineTemplate) -> Self {
        Self {
            claims: Vec::new(),
            views: HashMap::new(),
            tab: DisplayTab::default(),
            template: Arc::new(template),
        }
    }

    /// Replace the claim list with freshly extracted claims.
    pub fn load_claims(&mut self, claims: Vec<Claim>) {
        self.views.clear();
        self.claims = claims;
    }

    /// "New analysis": drop every claim and everything derived from them.
    pub fn reset(&mut self) {
        self.claims.clear();
        self.views.clear();
        self.tab = DisplayTab::default();
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn claim(&self, id: &ClaimId) -> Option<&Claim> {
        self.claims.iter().find(|c| &c.id == id)
    }

    pub fn view(&self, id: &ClaimId) -> Option<&ClaimView> {
        self.views.get(id)
    }

    /// The session transcript: each claim's trace in claim-list order.
    pub fn trace(&self) -> TraceLog {
        TraceLog::join(
            self.claims
                .iter()
                .filter_map(|c| self.views.get(&c.id))
                .map(|v| &v.trace),
        )
    }

    pub fn tab(&self) -> DisplayTab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: DisplayTab) {
        self.tab = tab;
    }

    /// Claims waiting for their first verification, in list order.
    pub fn pending(&self) -> Vec<Claim> {
        self.claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn apply(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::Started(id) => self.start(&id),
            StreamUpdate::Event(id, event) => self.dispatch(&id, &event),
            StreamUpdate::Finished(id, outcome) => self.finish(&id, outcome),
        }
    }

    fn claim_mut(&mut self, id: &ClaimId) -> Option<&mut Claim> {
        self.claims.iter_mut().find(|c| &c.id == id)
    }

    fn start(&mut self, id: &ClaimId) {
        let Some(claim) = self.claims.iter_mut().find(|c| &c.id == id) else {
            warn!(claim_id = %id, "start for unknown claim ignored");
            return;
        };
        if !claim.status.can_verify() {
            warn!(claim_id = %id, status = claim.status.as_str(), "claim not verifiable, start ignored");
            return;
        }
        claim.status = ClaimStatus::Verifying;
        claim.verification = Some(VerificationState::new());

        let view = self.views.entry(id.clone()).or_insert_with(|| ClaimView {
            tracker: AgentTracker::new(self.template.clone()),
            reasoning: ReasoningFeed::new(),
            trace: TraceLog::new(),
        });
        view.tracker.reset();
        view.reasoning = ReasoningFeed::new();
        view.trace.begin_claim(claim);
        info!(claim_id = %id, "verification started");
    }

    fn dispatch(&mut self, id: &ClaimId, event: &VerificationEvent) {
        let Some(claim) = self.claims.iter_mut().find(|c| &c.id == id) else {
            debug!(claim_id = %id, kind = event.kind(), "event for unknown claim dropped");
            return;
        };
        // Finished claims are frozen.
        if claim.status != ClaimStatus::Verifying {
            debug!(claim_id = %id, kind = event.kind(), "event after stream end dropped");
            return;
        }
        let Some(state) = claim.verification.as_mut() else {
            return;
        };
        match state.apply(event) {
            Reduction::FocusReasoning => self.tab = DisplayTab::Reasoning,
            Reduction::MissingTarget { id: target } => {
                debug!(claim_id = %id, kind = event.kind(), target = %target, "patch target missing");
            }
            Reduction::Changed | Reduction::Ignored => {}
        }

        let Some(view) = self.views.get_mut(id) else {
            return;
        };
        publish(
            event,
            &mut [&mut view.tracker, &mut view.reasoning, &mut view.trace],
        );
    }

    fn finish(&mut self, id: &ClaimId, outcome: StreamOutcome) {
        let Some(claim) = self.claim_mut(id) else {
            return;
        };
        if claim.status != ClaimStatus::Verifying {
            return;
        }
        match outcome {
            StreamOutcome::Completed => {
                claim.status = ClaimStatus::Done;
                info!(claim_id = %id, "verification done");
            }
            StreamOutcome::Failed(reason) => {
                claim.status = ClaimStatus::Error;
                warn!(claim_id = %id, reason = %reason, "verification failed");
                if let Some(view) = self.views.get_mut(id) {
                    view.trace.claim_failed(&reason);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Envelope;
    use crate::trace::TraceKind;
    use crate::tracker::ChipStatus;
    use serde_json::{Value, json};

    fn ev(kind: &str, data: Value) -> VerificationEvent {
        VerificationEvent::from_envelope(Envelope::new(kind, data)).unwrap()
    }

    fn board(ids: &[&str]) -> ClaimBoard {
        let mut b = ClaimBoard::new();
        b.load_claims(
            ids.iter()
                .map(|id| Claim::new(*id, format!("claim {id}")))
                .collect(),
        );
        b
    }

    fn id(s: &str) -> ClaimId {
        ClaimId::from(s)
    }

    #[test]
    fn lifecycle_pending_verifying_done() {
        let mut b = board(&["c1"]);
        assert_eq!(b.pending().len(), 1);
        b.apply(StreamUpdate::Started(id("c1")));
        assert_eq!(b.claim(&id("c1")).unwrap().status, ClaimStatus::Verifying);
        assert!(b.claim(&id("c1")).unwrap().verification.is_some());

        b.apply(StreamUpdate::Event(
            id("c1"),
            ev("step_start", json!({"step": "decomposition"})),
        ));
        b.apply(StreamUpdate::Finished(id("c1"), StreamOutcome::Completed));
        let claim = b.claim(&id("c1")).unwrap();
        assert_eq!(claim.status, ClaimStatus::Done);
        assert_eq!(
            claim.verification.as_ref().unwrap().current_step.as_deref(),
            Some("decomposition")
        );
        assert_eq!(
            b.view(&id("c1")).unwrap().tracker.chip("decompose").unwrap().status,
            ChipStatus::Active
        );
    }

    #[test]
    fn same_evidence_id_in_two_claims_stays_separate() {
        let mut b = board(&["c1", "c2"]);
        b.apply(StreamUpdate::Started(id("c1")));
        b.apply(StreamUpdate::Started(id("c2")));
        b.apply(StreamUpdate::Event(
            id("c1"),
            ev("evidence_found", json!({"id": "e1", "title": "c1 source"})),
        ));
        b.apply(StreamUpdate::Event(
            id("c2"),
            ev("evidence_found", json!({"id": "e1", "title": "c2 source"})),
        ));
        b.apply(StreamUpdate::Event(
            id("c1"),
            ev("evidence_scored", json!({"evidence_id": "e1", "quality_score": 0.9})),
        ));

        let s1 = b.claim(&id("c1")).unwrap().verification.as_ref().unwrap();
        let s2 = b.claim(&id("c2")).unwrap().verification.as_ref().unwrap();
        assert_eq!(s1.evidence.len(), 1);
        assert_eq!(s2.evidence.len(), 1);
        assert_eq!(s1.evidence[0].title, "c1 source");
        assert_eq!(s2.evidence[0].title, "c2 source");
        assert_eq!(s1.evidence[0].quality_score, Some(0.9));
        assert_eq!(s2.evidence[0].quality_score, None);
        assert_eq!(b.view(&id("c1")).unwrap().tracker.stats().sources, 1);
        assert_eq!(b.view(&id("c2")).unwrap().tracker.stats().sources, 1);
    }

    #[test]
    fn finished_claim_is_frozen() {
        let mut b = board(&["c1"]);
        b.apply(StreamUpdate::Started(id("c1")));
        b.apply(StreamUpdate::Finished(id("c1"), StreamOutcome::Completed));
        b.apply(StreamUpdate::Event(
            id("c1"),
            ev("subclaim", json!({"id": "s1", "text": "late"})),
        ));
        let state = b.claim(&id("c1")).unwrap().verification.as_ref().unwrap();
        assert!(state.subclaims.is_empty());
    }

    #[test]
    fn failure_marks_error_and_logs_to_trace() {
        let mut b = board(&["c1"]);
        b.apply(StreamUpdate::Started(id("c1")));
        b.apply(StreamUpdate::Finished(
            id("c1"),
            StreamOutcome::Failed("server returned 502".into()),
        ));
        assert_eq!(b.claim(&id("c1")).unwrap().status, ClaimStatus::Error);
        let trace = b.trace();
        let last = trace.lines().last().unwrap();
        assert_eq!(last.kind, TraceKind::Error);
        assert!(last.text.contains("502"));
    }

    #[test]
    fn interleaved_streams_keep_trace_sections_apart() {
        let mut b = board(&["c1", "c2"]);
        b.apply(StreamUpdate::Started(id("c1")));
        b.apply(StreamUpdate::Started(id("c2")));
        b.apply(StreamUpdate::Event(
            id("c2"),
            ev("subclaim", json!({"id": "s1", "text": "from c2"})),
        ));
        b.apply(StreamUpdate::Event(
            id("c1"),
            ev("subclaim", json!({"id": "s1", "text": "from c1"})),
        ));
        b.apply(StreamUpdate::Finished(id("c2"), StreamOutcome::Failed("timeout".into())));
        b.apply(StreamUpdate::Finished(id("c1"), StreamOutcome::Completed));

        let c1 = &b.view(&id("c1")).unwrap().trace;
        assert_eq!(c1.lines().len(), 2);
        assert!(c1.lines()[1].text.contains("from c1"));

        let trace = b.trace();
        let texts: Vec<&str> = trace.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "▶ Verifying claim: claim c1",
                "◦ Subclaim s1: from c1",
                "",
                "▶ Verifying claim: claim c2",
                "◦ Subclaim s1: from c2",
                "✗ Verification failed: timeout",
            ]
        );
    }

    #[test]
    fn retried_claim_keeps_its_earlier_run() {
        let mut b = board(&["c1"]);
        b.apply(StreamUpdate::Started(id("c1")));
        b.apply(StreamUpdate::Finished(id("c1"), StreamOutcome::Failed("boom".into())));
        b.apply(StreamUpdate::Started(id("c1")));
        let kinds: Vec<TraceKind> = b.trace().lines().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![TraceKind::Step, TraceKind::Error, TraceKind::Divider, TraceKind::Step]
        );
    }

    #[test]
    fn error_claim_can_be_retried_but_done_cannot() {
        let mut b = board(&["c1", "c2"]);
        for c in ["c1", "c2"] {
            b.apply(StreamUpdate::Started(id(c)));
        }
        b.apply(StreamUpdate::Finished(id("c1"), StreamOutcome::Failed("boom".into())));
        b.apply(StreamUpdate::Finished(id("c2"), StreamOutcome::Completed));

        b.apply(StreamUpdate::Started(id("c1")));
        b.apply(StreamUpdate::Started(id("c2")));
        assert_eq!(b.claim(&id("c1")).unwrap().status, ClaimStatus::Verifying);
        assert_eq!(b.claim(&id("c2")).unwrap().status, ClaimStatus::Done);
    }

    #[test]
    fn symbolic_confidence_switches_tab() {
        let mut b = board(&["c1"]);
        b.apply(StreamUpdate::Started(id("c1")));
        assert_eq!(b.tab(), DisplayTab::Report);
        b.apply(StreamUpdate::Event(
            id("c1"),
            ev("symbolic_confidence", json!({"confidence": 0.6})),
        ));
        assert_eq!(b.tab(), DisplayTab::Reasoning);
    }

    #[test]
    fn reasoning_goes_to_the_right_claim() {
        let mut b = board(&["c1", "c2"]);
        b.apply(StreamUpdate::Started(id("c1")));
        b.apply(StreamUpdate::Started(id("c2")));
        b.apply(StreamUpdate::Event(
            id("c2"),
            ev("agent_reasoning", json!({"agent": "a", "stage": "s", "message": "hello"})),
        ));
        assert!(b.view(&id("c1")).unwrap().reasoning.is_empty());
        assert_eq!(b.view(&id("c2")).unwrap().reasoning.len(), 1);
    }

    #[test]
    fn reset_discards_everything() {
        let mut b = board(&["c1"]);
        b.apply(StreamUpdate::Started(id("c1")));
        b.set_tab(DisplayTab::Trace);
        b.reset();
        assert!(b.claims().is_empty());
        assert!(b.view(&id("c1")).is_none());
        assert!(b.trace().is_empty());
        assert_eq!(b.tab(), DisplayTab::Report);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_patch_target_is_logged_once() {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut b = board(&["c1"]);
            b.apply(StreamUpdate::Started(id("c1")));
            b.apply(StreamUpdate::Event(
                id("c1"),
                ev("evidence_scored", json!({"evidence_id": "e9", "quality_score": 0.5})),
            ));
        });

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let hits: Vec<&str> = text.lines().filter(|l| l.contains("e9")).collect();
        assert_eq!(hits.len(), 1, "{text}");
        assert!(hits[0].contains("patch target missing"));
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let mut state = VerificationState::new();
        let mut log = TraceLog::new();
        let e = ev("subclaim", json!({"id": "s1", "text": "t"}));
        publish(&e, &mut [&mut state, &mut log]);
        assert_eq!(state.subclaims.len(), 1);
        assert_eq!(log.lines().len(), 1);
    }
}
