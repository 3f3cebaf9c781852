//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::script::ScriptConfig;

/// Default requested length of the crowd ambience track.
pub const DEFAULT_CROWD_DURATION_SECS: f64 = 20.0;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory for job workspaces
    pub work_dir: PathBuf,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Requested crowd ambience length in seconds
    pub crowd_duration_secs: f64,
    /// Kill an ffmpeg run after this long. Unset means no limit.
    pub ffmpeg_timeout: Option<Duration>,
    /// Leave workspaces on disk after a job ends
    pub keep_workspace: bool,
    /// Word budget parameters
    pub script: ScriptConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/sideline"),
            max_concurrent_jobs: 2,
            crowd_duration_secs: DEFAULT_CROWD_DURATION_SECS,
            ffmpeg_timeout: None,
            keep_workspace: false,
            script: ScriptConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub(crate) fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            work_dir: var("SIDELINE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_concurrent_jobs: var("SIDELINE_MAX_JOBS")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            crowd_duration_secs: var("SIDELINE_CROWD_DURATION_SECS")
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(defaults.crowd_duration_secs),
            ffmpeg_timeout: var("SIDELINE_FFMPEG_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            keep_workspace: var("SIDELINE_KEEP_WORKSPACE")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.keep_workspace),
            script: defaults.script,
        }
    }
}
