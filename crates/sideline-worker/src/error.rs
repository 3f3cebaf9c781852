//! Worker error types.

use std::fmt;

use sideline_media::{MediaError, MuxError};
use sideline_models::Stage;
use thiserror::Error;

use crate::collaborators::CollaboratorError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Coarse failure taxonomy reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Missing or unreadable source artifact
    InputInvalid,
    /// An external service errored
    CollaboratorFailure,
    /// A muxing sub-step exited non-zero or the tool is unavailable
    MediaToolFailure,
    /// Workspace allocation or cleanup
    WorkspaceFailure,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::InputInvalid => "input_invalid",
            FailureCategory::CollaboratorFailure => "collaborator_failure",
            FailureCategory::MediaToolFailure => "media_tool_failure",
            FailureCategory::WorkspaceFailure => "workspace_failure",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    #[error("Video analysis failed: {0}")]
    AnalysisFailed(#[source] CollaboratorError),

    #[error("Script generation failed: {0}")]
    ScriptFailed(#[source] CollaboratorError),

    #[error("Voice synthesis failed: {0}")]
    VoiceSynthesisFailed(#[source] CollaboratorError),

    #[error("Crowd synthesis failed: {0}")]
    CrowdSynthesisFailed(#[source] CollaboratorError),

    #[error("Mux failed: {0}")]
    MuxFailed(#[source] MuxError),

    #[error("Could not probe source video: {0}")]
    ProbeFailed(#[source] MediaError),

    #[error("Workspace error: {0}")]
    WorkspaceFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WorkerError {
    pub fn input_invalid(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    pub fn workspace_failed(msg: impl Into<String>) -> Self {
        Self::WorkspaceFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stays attributed to the mux stage. A missing input is categorized
    /// as `InputInvalid` by `category()`.
    pub fn from_mux(err: MuxError) -> Self {
        Self::MuxFailed(err)
    }

    /// An unreadable source is the caller's problem; a missing ffprobe is ours.
    pub fn from_probe(err: MediaError) -> Self {
        match err {
            MediaError::FileNotFound(_)
            | MediaError::InvalidVideo(_)
            | MediaError::FfprobeFailed { .. }
            | MediaError::JsonParse(_) => Self::InputInvalid(err.to_string()),
            other => Self::ProbeFailed(other),
        }
    }

    /// Pipeline stage the error came from, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkerError::AnalysisFailed(_) => Some(Stage::Analyze),
            WorkerError::ScriptFailed(_) => Some(Stage::Script),
            WorkerError::VoiceSynthesisFailed(_) => Some(Stage::Voice),
            WorkerError::CrowdSynthesisFailed(_) => Some(Stage::Crowd),
            WorkerError::MuxFailed(_) => Some(Stage::Mux),
            _ => None,
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            WorkerError::InputInvalid(_) => FailureCategory::InputInvalid,
            WorkerError::AnalysisFailed(_)
            | WorkerError::ScriptFailed(_)
            | WorkerError::VoiceSynthesisFailed(_)
            | WorkerError::CrowdSynthesisFailed(_) => FailureCategory::CollaboratorFailure,
            WorkerError::MuxFailed(e) if e.is_input_error() => FailureCategory::InputInvalid,
            WorkerError::MuxFailed(_) | WorkerError::ProbeFailed(_) => {
                FailureCategory::MediaToolFailure
            }
            WorkerError::WorkspaceFailed(_) | WorkerError::ConfigError(_) => {
                FailureCategory::WorkspaceFailure
            }
        }
    }
}
