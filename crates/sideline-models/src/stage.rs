//! Pipeline stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// One discrete step of the commentary pipeline, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Video understanding
    Analyze,
    /// Commentary script generation
    Script,
    /// Narration speech synthesis
    Voice,
    /// Crowd ambience synthesis
    Crowd,
    /// Final media assembly
    Mux,
}

impl Stage {
    /// Number of stages in a job. Included in every progress event.
    pub const TOTAL: u8 = 5;

    /// All stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Analyze,
        Stage::Script,
        Stage::Voice,
        Stage::Crowd,
        Stage::Mux,
    ];

    /// 1-based position of the stage.
    pub fn ordinal(&self) -> u8 {
        match self {
            Stage::Analyze => 1,
            Stage::Script => 2,
            Stage::Voice => 3,
            Stage::Crowd => 4,
            Stage::Mux => 5,
        }
    }

    /// Look up a stage by its 1-based ordinal.
    pub fn from_ordinal(ordinal: u8) -> ModelResult<Self> {
        Self::ALL
            .get(usize::from(ordinal).wrapping_sub(1))
            .copied()
            .ok_or(ModelError::UnknownStage(ordinal))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Script => "script",
            Stage::Voice => "voice",
            Stage::Crowd => "crowd",
            Stage::Mux => "mux",
        }
    }

    /// Human-readable completion message shown to live clients.
    pub fn completion_message(&self) -> &'static str {
        match self {
            Stage::Analyze => "Video analysis complete",
            Stage::Script => "Commentary script generated",
            Stage::Voice => "Commentary audio generated",
            Stage::Crowd => "Crowd noise generated",
            Stage::Mux => "Final video assembled",
        }
    }

    /// Whether this is the last stage of a job.
    pub fn is_last(&self) -> bool {
        matches!(self, Stage::Mux)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
