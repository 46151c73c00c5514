//! Pipeline stage machine
//!
//! `Categorizing → Retrieving → Generating → Done`, with `Retrieving`
//! skipped when retrieval is disabled. Every stage has exactly one
//! successor, so a run always reaches `Done`.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::StageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Categorizing,
    Retrieving,
    Generating,
    /// Terminal
    Done,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done)
    }

    /// Successor stage
    pub fn next(&self, retrieval_enabled: bool) -> PipelineStage {
        use PipelineStage::*;

        match self {
            Categorizing if retrieval_enabled => Retrieving,
            Categorizing => Generating,
            Retrieving => Generating,
            Generating => Done,
            Done => Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Categorizing => "categorize",
            PipelineStage::Retrieving => "retrieve",
            PipelineStage::Generating => "generate",
            PipelineStage::Done => "done",
        }
    }
}

/// Drives the stage machine and times each step
#[derive(Debug)]
pub struct StageTracker {
    stage: PipelineStage,
    retrieval_enabled: bool,
    started: Instant,
    records: Vec<StageRecord>,
}

impl StageTracker {
    pub fn new(retrieval_enabled: bool) -> Self {
        Self {
            stage: PipelineStage::Categorizing,
            retrieval_enabled,
            started: Instant::now(),
            records: Vec::new(),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Record a named step within the current stage and restart the clock
    pub fn record(&mut self, name: &str, result_summary: impl Into<String>) {
        self.records.push(StageRecord {
            name: name.to_string(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            result_summary: result_summary.into(),
        });
        self.started = Instant::now();
    }

    /// Close the current stage with a summary and move on
    pub fn complete(&mut self, result_summary: impl Into<String>) -> PipelineStage {
        if !self.stage.is_terminal() {
            let name = self.stage.as_str();
            self.record(name, result_summary);
        }
        self.advance()
    }

    /// Move on without recording; for stages already recorded step by step
    pub fn advance(&mut self) -> PipelineStage {
        self.stage = self.stage.next(self.retrieval_enabled);
        self.stage
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StageRecord> {
        self.records
    }
}
