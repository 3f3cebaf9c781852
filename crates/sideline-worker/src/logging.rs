//! Structured job logging.
//!
//! Every line carries `job_id` and `operation` so one job can be followed
//! through interleaved output from concurrent jobs.

use std::time::Duration;

use sideline_models::{JobId, Stage};
use tracing::{error, info, warn, Span};

/// Logs lifecycle events for one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// # Arguments
    /// * `job_id` - The job being logged
    /// * `operation` - What the job is doing, e.g. "commentary"
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    /// A stage finished.
    pub fn log_stage(&self, stage: Stage, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = stage.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage {}/{} complete: {}",
            stage.ordinal(),
            Stage::TOTAL,
            stage.completion_message()
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span to instrument the job's future with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
