//! Shared data models for the Sideline commentary pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job state and pipeline stages
//! - Commentary requests and narration languages
//! - Progress event schemas for the out-of-band status channel

pub mod error;
pub mod job;
pub mod language;
pub mod progress;
pub mod request;
pub mod stage;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobId, JobState};
pub use language::Language;
pub use progress::{ProgressEvent, ProgressMessage};
pub use request::{CommentaryRequest, SubscriberId};
pub use stage::Stage;
