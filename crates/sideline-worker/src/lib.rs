//! Commentary job pipeline.
//!
//! This crate handles:
//! - The external collaborators (video analysis, script writing, speech and
//!   crowd synthesis) and their HTTP clients
//! - Word budgeting and script post-processing
//! - Per-job workspaces
//! - Best-effort progress fan-out to live subscribers
//! - Running a job end-to-end and hosting concurrent jobs

pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod script;
pub mod service;
pub mod workspace;

pub use collaborators::{
    CollaboratorError, Collaborators, CrowdSynthesizer, ScriptRequest, ScriptWriter,
    VideoAnalyzer, VoiceSynthesizer, CROWD_PROMPT,
};
pub use config::WorkerConfig;
pub use error::{FailureCategory, WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::JobPipeline;
pub use progress::ProgressReporter;
pub use script::{finalize_script, ScriptConfig};
pub use service::{CommentaryService, CompletedJob};
pub use workspace::Workspace;
