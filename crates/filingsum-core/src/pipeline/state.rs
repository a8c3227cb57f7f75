//! Orchestrator state machine

use std::fmt;

use tracing::{debug, warn};

/// Where a pipeline run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Resuming,
    /// Working on the chunk with this index
    Processing(usize),
    Reducing,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether `next` may follow this state
    pub fn can_advance(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Init, Resuming) => true,
            (Resuming, Processing(_)) | (Resuming, Reducing) => true,
            (Processing(i), Processing(j)) => j == i + 1,
            (Processing(_), Reducing) => true,
            (Reducing, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => f.write_str("INIT"),
            PipelineState::Resuming => f.write_str("RESUMING"),
            PipelineState::Processing(i) => write!(f, "PROCESSING({i})"),
            PipelineState::Reducing => f.write_str("REDUCING"),
            PipelineState::Done => f.write_str("DONE"),
            PipelineState::Failed => f.write_str("FAILED"),
        }
    }
}

/// Current state of one run, logging every transition
#[derive(Debug)]
pub(crate) struct StateTracker {
    current: PipelineState,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: PipelineState::Init,
        }
    }

    pub(crate) fn current(&self) -> PipelineState {
        self.current
    }

    pub(crate) fn advance(&mut self, next: PipelineState) {
        if !self.current.can_advance(next) {
            warn!(from = %self.current, to = %next, "unexpected pipeline transition");
        }
        debug!(from = %self.current, to = %next, "pipeline_transition");
        self.current = next;
    }
}
