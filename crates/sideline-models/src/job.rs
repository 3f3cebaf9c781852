//! Job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{CommentaryRequest, Language, Stage, SubscriberId};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, not started
    #[default]
    Pending,
    /// Stages are running
    Processing,
    /// Final video produced
    Completed,
    /// A stage failed; no output
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One request to produce a commentated video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    /// Live client that receives this job's progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<SubscriberId>,
    /// Uploaded source clip
    pub source_video: PathBuf,
    pub language: Language,
    /// Name the commentator may call the player by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Narration word budget, known once the source duration is probed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_budget: Option<usize>,
    /// Last stage that completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job for a request under a fresh id.
    pub fn new(request: CommentaryRequest) -> Self {
        Self {
            id: JobId::new(),
            subscriber: request.subscriber,
            source_video: request.video,
            language: request.language,
            display_name: request.display_name,
            word_budget: None,
            stage: None,
            state: JobState::Pending,
            output: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark the job as running.
    pub fn start(&mut self) {
        self.state = JobState::Processing;
    }

    /// Record that a stage finished.
    pub fn complete_stage(&mut self, stage: Stage) {
        self.stage = Some(stage);
    }

    /// The stage that runs after the last completed one, if any.
    pub fn next_stage(&self) -> Option<Stage> {
        match self.stage {
            None => Some(Stage::Analyze),
            Some(stage) => Stage::from_ordinal(stage.ordinal() + 1).ok(),
        }
    }

    /// Mark the job as completed with its final artifact.
    pub fn succeed(&mut self, output: PathBuf) {
        self.state = JobState::Completed;
        self.output = Some(output);
        self.finished_at = Some(Utc::now());
    }

    /// Mark the job as failed.
    pub fn fail(&mut self) {
        self.state = JobState::Failed;
        self.output = None;
        self.finished_at = Some(Utc::now());
    }
}
