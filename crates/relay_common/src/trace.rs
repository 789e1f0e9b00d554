//! Routing trace: a structured record of every stage attempt for one
//! utterance, rendered per configured verbosity.
//!
//! All text comes from static templates; rendering is pure formatting with
//! no side effects beyond the returned string.

use serde::{Deserialize, Serialize};

use crate::types::{Stage, StageOutcome};

/// Debug verbosity for routing traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugLevel {
    None,
    Low,
    Verbose,
}

impl Default for DebugLevel {
    fn default() -> Self {
        DebugLevel::None
    }
}

impl DebugLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Verbose => "verbose",
        }
    }
}

/// One stage attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub detail: String,
}

/// Ordered trace of one utterance's routing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingTrace {
    pub entries: Vec<TraceEntry>,
}

impl RoutingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one stage decision.
    pub fn record(&mut self, stage: Stage, outcome: StageOutcome, detail: impl Into<String>) {
        self.entries.push(TraceEntry {
            stage,
            outcome,
            detail: detail.into(),
        });
    }

    /// The stage that produced the final answer, if any stage succeeded.
    pub fn answered_by(&self) -> Option<&TraceEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.outcome == StageOutcome::Success)
    }

    /// Render the trace at the given verbosity.
    pub fn render(&self, level: DebugLevel) -> String {
        match level {
            DebugLevel::None => String::new(),
            DebugLevel::Low => match self.answered_by() {
                Some(entry) => format!("answered by {}", entry.stage),
                None => match self.entries.last() {
                    Some(entry) => format!("no stage answered; last: {} {}", entry.stage, entry.outcome),
                    None => "no stages attempted".to_string(),
                },
            },
            DebugLevel::Verbose => self
                .entries
                .iter()
                .enumerate()
                .map(|(i, e)| format!("{}. {} {}: {}", i + 1, e.stage, e.outcome, e.detail))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
