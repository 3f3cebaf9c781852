//! Job metrics.
//!
//! Recorded through the `metrics` facade; they are dropped unless the host
//! process installs a recorder.

use metrics::{counter, gauge, histogram};
use sideline_models::Stage;

use crate::error::WorkerError;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "sideline_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "sideline_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "sideline_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "sideline_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "sideline_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "sideline_stage_duration_seconds";
    pub const PROGRESS_EVENTS_DROPPED_TOTAL: &str = "sideline_progress_events_dropped_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(error: &WorkerError) {
    let labels = [
        (
            "stage",
            error.stage().map(|s| s.as_str()).unwrap_or("none").to_string(),
        ),
        ("category", error.category().as_str().to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_progress_dropped(reason: &'static str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::PROGRESS_EVENTS_DROPPED_TOTAL, &labels).increment(1);
}
