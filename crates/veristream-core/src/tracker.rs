//! Agent pipeline tracker: which processing stage is running for one claim.
//!
//! The stage list lives in an immutable [`PipelineTemplate`]; every
//! verification starts from a fresh copy of it. Chip status only moves forward
//! (pending → active → done).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::board::Subscriber;
use crate::event::VerificationEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipStatus {
    Pending,
    Active,
    Done,
}

/// One pipeline stage as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentChip {
    pub id: String,
    pub service: String,
    pub task: String,
    pub label: String,
    pub color: String,
    pub status: ChipStatus,
}

impl AgentChip {
    fn activate(&mut self) {
        if self.status == ChipStatus::Pending {
            self.status = ChipStatus::Active;
        }
    }

    fn complete(&mut self) {
        self.status = ChipStatus::Done;
    }
}

/// Counters for one claim's run. Every field only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub steps: u32,
    pub api_calls: u32,
    pub services: BTreeSet<String>,
    pub sources: u32,
    pub duration_ms: u64,
}

// ── Template ──

struct StageDef {
    id: &'static str,
    service: &'static str,
    task: &'static str,
    label: &'static str,
    color: &'static str,
}

const STAGES: &[StageDef] = &[
    StageDef { id: "extract", service: "llm", task: "extraction", label: "Claim Extraction", color: "#8b5cf6" },
    StageDef { id: "decompose", service: "llm", task: "decomposition", label: "Decomposition", color: "#6366f1" },
    StageDef { id: "entity", service: "edgar", task: "entity_resolution", label: "Entity Resolution", color: "#0ea5e9" },
    StageDef { id: "normalize", service: "llm", task: "normalization", label: "Normalization", color: "#14b8a6" },
    StageDef { id: "filings", service: "edgar", task: "evidence_retrieval", label: "SEC Filings", color: "#2563eb" },
    StageDef { id: "news", service: "web", task: "evidence_retrieval", label: "News & Press", color: "#f59e0b" },
    StageDef { id: "market", service: "market", task: "evidence_retrieval", label: "Market Data", color: "#10b981" },
    StageDef { id: "counter", service: "web", task: "evidence_retrieval", label: "Counter-Evidence", color: "#ef4444" },
    StageDef { id: "scoring", service: "llm", task: "evidence_scoring", label: "Evidence Scoring", color: "#a855f7" },
    StageDef { id: "contradictions", service: "llm", task: "contradiction_detection", label: "Contradictions", color: "#dc2626" },
    StageDef { id: "consistency", service: "llm", task: "consistency_analysis", label: "Consistency", color: "#f97316" },
    StageDef { id: "plausibility", service: "llm", task: "plausibility_assessment", label: "Plausibility", color: "#84cc16" },
    StageDef { id: "provenance", service: "web", task: "provenance_tracing", label: "Provenance", color: "#06b6d4" },
    StageDef { id: "temporal", service: "xbrl", task: "temporal_analysis", label: "Temporal / XBRL", color: "#3b82f6" },
    StageDef { id: "symbolic", service: "rules", task: "symbolic_reasoning", label: "Symbolic Reasoning", color: "#64748b" },
    StageDef { id: "synthesis", service: "llm", task: "synthesis", label: "Verdict Synthesis", color: "#22c55e" },
    StageDef { id: "reconcile", service: "llm", task: "reconciliation", label: "Reconciliation", color: "#eab308" },
];

/// Stage completed before verification starts.
const SENTINEL: &str = "extract";

/// `step_start` / `step_complete` step name → chip ids.
const STEP_CHIPS: &[(&str, &[&str])] = &[
    ("decomposition", &["decompose"]),
    ("entity_resolution", &["entity"]),
    ("normalization", &["normalize"]),
    ("evidence_retrieval", &["filings", "news", "market", "counter"]),
    ("evidence_scoring", &["scoring"]),
    ("contradiction_detection", &["contradictions"]),
    ("consistency_analysis", &["consistency"]),
    ("plausibility_assessment", &["plausibility"]),
    ("provenance_tracing", &["provenance"]),
    ("temporal_analysis", &["temporal"]),
    ("symbolic_reasoning", &["symbolic"]),
    ("synthesis", &["synthesis"]),
    ("reconciliation", &["reconcile"]),
];

/// Immutable description of the pipeline: its stages and which step names
/// drive them. Shared between trackers; never mutated after construction.
#[derive(Debug, Clone)]
pub struct PipelineTemplate {
    chips: Vec<AgentChip>,
    sentinel: Option<String>,
    on_start: HashMap<String, Vec<String>>,
    on_complete: HashMap<String, Vec<String>>,
}

impl Default for PipelineTemplate {
    fn default() -> Self {
        Self::standard()
    }
}

impl PipelineTemplate {
    /// The stage layout of the remote verification service.
    pub fn standard() -> Self {
        let chips = STAGES
            .iter()
            .map(|s| AgentChip {
                id: s.id.to_string(),
                service: s.service.to_string(),
                task: s.task.to_string(),
                label: s.label.to_string(),
                color: s.color.to_string(),
                status: ChipStatus::Pending,
            })
            .collect();
        let table: HashMap<String, Vec<String>> = STEP_CHIPS
            .iter()
            .map(|(step, ids)| (step.to_string(), ids.iter().map(|s| s.to_string()).collect()))
            .collect();
        Self {
            chips,
            sentinel: Some(SENTINEL.to_string()),
            on_start: table.clone(),
            on_complete: table,
        }
    }

    /// A fresh chip list: the sentinel stage done, everything else pending.
    pub fn fresh_chips(&self) -> Vec<AgentChip> {
        let mut chips = self.chips.clone();
        for chip in &mut chips {
            chip.status = if self.sentinel.as_deref() == Some(chip.id.as_str()) {
                ChipStatus::Done
            } else {
                ChipStatus::Pending
            };
        }
        chips
    }

    pub fn chips_started_by(&self, step: &str) -> &[String] {
        self.on_start.get(step).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn chips_completed_by(&self, step: &str) -> &[String] {
        self.on_complete.get(step).map(Vec::as_slice).unwrap_or_default()
    }
}

// ── Tracker ──

#[derive(Debug, Clone)]
pub struct AgentTracker {
    template: Arc<PipelineTemplate>,
    chips: Vec<AgentChip>,
    stats: PipelineStats,
}

impl Default for AgentTracker {
    fn default() -> Self {
        Self::new(Arc::new(PipelineTemplate::standard()))
    }
}

impl AgentTracker {
    pub fn new(template: Arc<PipelineTemplate>) -> Self {
        let chips = template.fresh_chips();
        Self {
            template,
            chips,
            stats: PipelineStats::default(),
        }
    }

    /// Start over from the template, as at the beginning of a verification.
    pub fn reset(&mut self) {
        self.chips = self.template.fresh_chips();
        self.stats = PipelineStats::default();
    }

    pub fn chips(&self) -> &[AgentChip] {
        &self.chips
    }

    pub fn chip(&self, id: &str) -> Option<&AgentChip> {
        self.chips.iter().find(|c| c.id == id)
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Chips currently running.
    pub fn active(&self) -> impl Iterator<Item = &AgentChip> {
        self.chips.iter().filter(|c| c.status == ChipStatus::Active)
    }

    fn step_started(&mut self, step: &str) {
        let ids = self.template.chips_started_by(step);
        if ids.is_empty() {
            return;
        }
        self.stats.steps += 1;
        for id in ids {
            if let Some(chip) = self.chips.iter_mut().find(|c| &c.id == id) {
                chip.activate();
                self.stats.api_calls += 1;
                self.stats.services.insert(chip.service.clone());
            }
        }
    }

    fn step_completed(&mut self, step: &str, duration_ms: Option<u64>) {
        let ids = self.template.chips_completed_by(step);
        for id in ids {
            if let Some(chip) = self.chips.iter_mut().find(|c| &c.id == id) {
                chip.complete();
            }
        }
        if let Some(ms) = duration_ms {
            self.stats.duration_ms = self.stats.duration_ms.saturating_add(ms);
        }
    }
}

impl Subscriber for AgentTracker {
    fn on_event(&mut self, event: &VerificationEvent) {
        match event {
            VerificationEvent::StepStart(s) => self.step_started(&s.step),
            VerificationEvent::StepComplete(s) => self.step_completed(&s.step, s.duration_ms),
            VerificationEvent::EvidenceFound(_) => self.stats.sources += 1,
            VerificationEvent::VerificationComplete(c) => {
                for chip in &mut self.chips {
                    if chip.status == ChipStatus::Active {
                        chip.complete();
                    }
                }
                if let Some(total) = c.total_duration_ms {
                    self.stats.duration_ms = self.stats.duration_ms.max(total);
                }
                if let Some(total) = c.total_sources {
                    self.stats.sources = self.stats.sources.max(total);
                }
            }
            _ => {}
        }
    }
}
