//! Pipeline state machine
//!
//! INIT → STAGE1_DONE → PATTERNS_DONE → STAGE2_DONE → STAGE3_DONE →
//! STAGE4_DONE → COMPLETE, plus terminal FAILED(stage, reason).
//!
//! Transitions only move forward. Resume skips ahead to the state implied by
//! the checkpoints it loaded, which is still a forward move from INIT.

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Checkpointed stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: per-document analysis
    Deconstruction,
    /// Stage 1b: pattern recognizer fan-out/fan-in
    Patterns,
    /// Stage 2: thematic clustering
    Categorization,
    /// Stage 3: per-theme synthesis
    Synthesis,
    /// Stage 4: validation
    Validation,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Deconstruction,
        Stage::Patterns,
        Stage::Categorization,
        Stage::Synthesis,
        Stage::Validation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Deconstruction => "deconstruction",
            Stage::Patterns => "patterns",
            Stage::Categorization => "categorization",
            Stage::Synthesis => "synthesis",
            Stage::Validation => "validation",
        }
    }

    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::Deconstruction => None,
            Stage::Patterns => Some(Stage::Deconstruction),
            Stage::Categorization => Some(Stage::Patterns),
            Stage::Synthesis => Some(Stage::Categorization),
            Stage::Validation => Some(Stage::Synthesis),
        }
    }

    /// State reached once this stage's checkpoint is written
    pub fn done_state(&self) -> PipelineState {
        match self {
            Stage::Deconstruction => PipelineState::Stage1Done,
            Stage::Patterns => PipelineState::PatternsDone,
            Stage::Categorization => PipelineState::Stage2Done,
            Stage::Synthesis => PipelineState::Stage3Done,
            Stage::Validation => PipelineState::Stage4Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deconstruction" | "stage1" => Ok(Stage::Deconstruction),
            "patterns" | "stage1b" => Ok(Stage::Patterns),
            "categorization" | "stage2" => Ok(Stage::Categorization),
            "synthesis" | "stage3" => Ok(Stage::Synthesis),
            "validation" | "stage4" => Ok(Stage::Validation),
            other => Err(format!("unknown stage: {}", other)),
        }
    }
}

/// Orchestrator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Init,
    Stage1Done,
    PatternsDone,
    Stage2Done,
    Stage3Done,
    Stage4Done,
    Complete,
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    /// Position along the forward path; `None` for the failed state
    fn rank(&self) -> Option<u8> {
        match self {
            PipelineState::Init => Some(0),
            PipelineState::Stage1Done => Some(1),
            PipelineState::PatternsDone => Some(2),
            PipelineState::Stage2Done => Some(3),
            PipelineState::Stage3Done => Some(4),
            PipelineState::Stage4Done => Some(5),
            PipelineState::Complete => Some(6),
            PipelineState::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed { .. })
    }

    /// Last stage whose output is checkpointed in this state
    pub fn last_completed_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Init | PipelineState::Failed { .. } => None,
            PipelineState::Stage1Done => Some(Stage::Deconstruction),
            PipelineState::PatternsDone => Some(Stage::Patterns),
            PipelineState::Stage2Done => Some(Stage::Categorization),
            PipelineState::Stage3Done => Some(Stage::Synthesis),
            PipelineState::Stage4Done | PipelineState::Complete => Some(Stage::Validation),
        }
    }

    pub fn label(&self) -> String {
        match self {
            PipelineState::Init => "INIT".to_string(),
            PipelineState::Stage1Done => "STAGE1_DONE".to_string(),
            PipelineState::PatternsDone => "PATTERNS_DONE".to_string(),
            PipelineState::Stage2Done => "STAGE2_DONE".to_string(),
            PipelineState::Stage3Done => "STAGE3_DONE".to_string(),
            PipelineState::Stage4Done => "STAGE4_DONE".to_string(),
            PipelineState::Complete => "COMPLETE".to_string(),
            PipelineState::Failed { stage, .. } => format!("FAILED({})", stage),
        }
    }
}

/// Recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: String,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// Serializable run state, mutated only through [`PipelineRun::transition_to`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub state: PipelineState,
    pub history: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: PipelineState::Init,
            history: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state`
    ///
    /// Allowed: any strictly forward move along the happy path, or a move to
    /// `Failed` from any non-terminal state.
    pub fn transition_to(
        &mut self,
        new_state: PipelineState,
    ) -> Result<StateTransition, PipelineError> {
        let allowed = match (self.state.rank(), new_state.rank()) {
            _ if self.state.is_terminal() => false,
            (Some(_), None) => true,
            (Some(from), Some(to)) => to > from,
            (None, _) => false,
        };

        if !allowed {
            return Err(PipelineError::InvalidTransition {
                from: self.state.label(),
                to: new_state.label(),
            });
        }

        let transition = StateTransition {
            run_id: self.run_id.clone(),
            old_state: self.state.clone(),
            new_state: new_state.clone(),
            transitioned_at: Utc::now(),
        };

        tracing::debug!(
            run_id = %self.run_id,
            from = %self.state.label(),
            to = %new_state.label(),
            "Pipeline state transition"
        );

        self.state = new_state;
        if self.state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }
        self.history.push(transition.clone());
        Ok(transition)
    }

    /// Last stage whose checkpoint this run has written or loaded
    pub fn last_completed_stage(&self) -> Option<Stage> {
        self.history
            .iter()
            .rev()
            .find_map(|t| t.new_state.last_completed_stage())
    }
}
