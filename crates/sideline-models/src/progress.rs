//! Progress message types for the out-of-band status channel.
//!
//! Clients render these as they arrive; the envelope is tagged so a
//! browser can switch on `type` without knowing the pipeline layout.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{JobId, Stage};

/// A progress message addressed to one job's subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub message: ProgressMessage,
}

impl ProgressEvent {
    pub fn new(job_id: JobId, message: ProgressMessage) -> Self {
        Self { job_id, message }
    }

    /// Stage ordinal carried by the message, if it is a stage event.
    pub fn ordinal(&self) -> Option<u8> {
        match &self.message {
            ProgressMessage::Stage { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }
}

/// Progress message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
    /// A pipeline stage completed
    Stage {
        stage: Stage,
        ordinal: u8,
        total: u8,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// The job produced its final video
    Done {
        output: String,
        timestamp: DateTime<Utc>,
    },

    /// The job failed
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressMessage {
    /// Create a stage completion message.
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        ProgressMessage::Stage {
            stage,
            ordinal: stage.ordinal(),
            total: Stage::TOTAL,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a done message.
    pub fn done(output: impl Into<String>) -> Self {
        ProgressMessage::Done {
            output: output.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a failure message.
    pub fn failed(stage: Option<Stage>, message: impl Into<String>) -> Self {
        ProgressMessage::Failed {
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ProgressMessage::Stage { .. } => "stage",
            ProgressMessage::Done { .. } => "done",
            ProgressMessage::Failed { .. } => "failed",
        }
    }

    /// Whether no further messages follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressMessage::Stage { .. })
    }
}
