//! Narration feed: the free-text `agent_reasoning` events, in arrival order.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::board::Subscriber;
use crate::event::{AgentReasoning, VerificationEvent};
use crate::trace::truncate;

pub const DETAIL_MAX: usize = 180;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningEntry {
    pub agent: String,
    pub stage: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Local time the entry was received; the server sends no timestamp.
    pub received_at: DateTime<Local>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReasoningFeed {
    entries: Vec<ReasoningEntry>,
    /// Index the view is scrolled to; always the newest entry.
    cursor: Option<usize>,
}

impl ReasoningFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ReasoningEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry currently in view.
    pub fn focused(&self) -> Option<&ReasoningEntry> {
        self.cursor.and_then(|i| self.entries.get(i))
    }

    pub fn push_at(&mut self, narration: &AgentReasoning, received_at: DateTime<Local>) {
        self.entries.push(ReasoningEntry {
            agent: narration.agent.clone(),
            stage: narration.stage.clone(),
            message: narration.message.clone(),
            detail: narration.detail.as_deref().map(|d| truncate(d, DETAIL_MAX)),
            received_at,
        });
        self.cursor = Some(self.entries.len() - 1);
    }
}

impl Subscriber for ReasoningFeed {
    fn on_event(&mut self, event: &VerificationEvent) {
        if let VerificationEvent::AgentReasoning(narration) = event {
            self.push_at(narration, Local::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn narration(message: &str, detail: Option<String>) -> AgentReasoning {
        AgentReasoning {
            agent: "retriever".into(),
            stage: "evidence_retrieval".into(),
            message: message.into(),
            detail,
        }
    }

    #[test]
    fn keeps_arrival_order_and_follows_latest() {
        let mut feed = ReasoningFeed::new();
        feed.on_event(&VerificationEvent::AgentReasoning(narration("first", None)));
        feed.on_event(&VerificationEvent::AgentReasoning(narration("second", None)));
        let messages: Vec<&str> = feed.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(feed.focused().unwrap().message, "second");
    }

    #[test]
    fn detail_is_truncated() {
        let mut feed = ReasoningFeed::new();
        let at = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        feed.push_at(&narration("m", Some("d".repeat(400))), at);
        let entry = &feed.entries()[0];
        assert_eq!(entry.detail.as_ref().unwrap().chars().count(), DETAIL_MAX + 1);
        assert_eq!(entry.received_at, at);
    }

    #[test]
    fn ignores_other_events() {
        let mut feed = ReasoningFeed::new();
        feed.on_event(&VerificationEvent::Unknown {
            kind: "noise".into(),
        });
        assert!(feed.is_empty());
        assert!(feed.focused().is_none());
    }
}
