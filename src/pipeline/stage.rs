//! Pipeline stage machine
//!
//! Linear progression with one failure sink:
//!
//! ```text
//! Init → Loaded → Chunked → Embedded → Indexed → Retrieved → Answered
//!   └────────┴─────────┴──────────┴─────────┴──────────┴──→ Failed
//! ```
//!
//! `Answered` and `Failed` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{QaError, Result};

/// Pipeline run stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Init,
    Loaded,
    Chunked,
    Embedded,
    Indexed,
    Retrieved,
    Answered,
    Failed,
}

impl PipelineStage {
    /// All stages in run order, `Failed` last
    pub const ALL: [PipelineStage; 8] = [
        PipelineStage::Init,
        PipelineStage::Loaded,
        PipelineStage::Chunked,
        PipelineStage::Embedded,
        PipelineStage::Indexed,
        PipelineStage::Retrieved,
        PipelineStage::Answered,
        PipelineStage::Failed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Answered | PipelineStage::Failed)
    }

    /// Next stage on success
    pub fn advance(&self) -> Result<PipelineStage> {
        use PipelineStage::*;

        let next = match self {
            Init => Loaded,
            Loaded => Chunked,
            Chunked => Embedded,
            Embedded => Indexed,
            Indexed => Retrieved,
            Retrieved => Answered,
            Answered | Failed => {
                return Err(QaError::InvalidTransition {
                    from: format!("{:?}", self),
                    reason: "stage is terminal".to_string(),
                });
            }
        };

        Ok(next)
    }

    /// Move to `Failed`. Only an already terminal stage rejects this.
    pub fn fail(&self) -> Result<PipelineStage> {
        if self.is_terminal() {
            return Err(QaError::InvalidTransition {
                from: format!("{:?}", self),
                reason: "cannot fail a finished run".to_string(),
            });
        }
        Ok(PipelineStage::Failed)
    }

    /// Human-readable stage name
    pub fn display_name(&self) -> &'static str {
        match self {
            PipelineStage::Init => "Starting",
            PipelineStage::Loaded => "Document loaded",
            PipelineStage::Chunked => "Document chunked",
            PipelineStage::Embedded => "Chunks embedded",
            PipelineStage::Indexed => "Index built",
            PipelineStage::Retrieved => "Context retrieved",
            PipelineStage::Answered => "Answered",
            PipelineStage::Failed => "Failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Current stage plus the path that led to it
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: PipelineStage,
    history: Vec<PipelineStage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: PipelineStage::Init,
            history: vec![PipelineStage::Init],
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn advance(&mut self) -> Result<PipelineStage> {
        let next = self.current.advance()?;
        self.record(next);
        Ok(next)
    }

    pub fn fail(&mut self) -> Result<PipelineStage> {
        let next = self.current.fail()?;
        self.record(next);
        Ok(next)
    }

    fn record(&mut self, next: PipelineStage) {
        tracing::trace!(from = ?self.current, to = ?next, "stage transition");
        self.current = next;
        self.history.push(next);
    }
}
