//! Per-job workspaces.
//!
//! Artifact names are fixed, so isolation comes from the directory: every
//! job gets a fresh, uniquely named directory under the work dir, even when
//! two jobs share an identifier or an input filename.

use std::path::{Path, PathBuf};

use sideline_media::MuxLayout;
use sideline_models::JobId;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{WorkerError, WorkerResult};

pub const VOICE_TRACK_FILE: &str = "voice.mp3";
pub const CROWD_TRACK_FILE: &str = "crowd.mp3";

/// Directory owning every artifact of one job. Removed on drop unless kept.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Create a fresh workspace for `job_id` under `work_dir`.
    pub fn create(work_dir: &Path, job_id: &JobId) -> WorkerResult<Self> {
        std::fs::create_dir_all(work_dir).map_err(|e| {
            WorkerError::workspace_failed(format!(
                "cannot create work dir {}: {}",
                work_dir.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id))
            .tempdir_in(work_dir)
            .map_err(|e| {
                WorkerError::workspace_failed(format!(
                    "cannot allocate workspace in {}: {}",
                    work_dir.display(),
                    e
                ))
            })?;

        debug!(job_id = %job_id, "Workspace allocated: {}", dir.path().display());
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
            keep: false,
        })
    }

    /// Leave the directory on disk when the workspace is released.
    pub fn keep_on_drop(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn voice_track(&self) -> PathBuf {
        self.path.join(VOICE_TRACK_FILE)
    }

    pub fn crowd_track(&self) -> PathBuf {
        self.path.join(CROWD_TRACK_FILE)
    }

    /// Silent, voiced and final video paths.
    pub fn mux_layout(&self) -> MuxLayout {
        MuxLayout::in_dir(&self.path)
    }

    /// Remove the directory now. Failures are logged, never returned.
    pub fn discard(mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if self.keep {
            debug!("Keeping workspace {}", self.path.display());
            persist(dir);
        } else if let Err(e) = dir.close() {
            warn!("Failed to remove workspace {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.keep {
                persist(dir);
            }
        }
    }
}

#[allow(deprecated)]
fn persist(dir: TempDir) {
    let _ = dir.into_path();
}
