//! Commentary muxing: silent video + narration + crowd ambience.
//!
//! # Steps
//!
//! 1. **Strip**: copy the video stream, drop the original audio.
//! 2. **Overlay**: freeze the last frame for `FRAME_HOLD_SECS` and lay the
//!    narration over it. `-shortest` caps the result at
//!    `min(held video, narration)`, so narration is never cut by a short clip.
//! 3. **Mix**: fade the crowd track in over one second at 25% volume, mix it
//!    under the narration and trim to the shorter of audio and video.
//!
//! Intermediates live next to the final file in the job's workspace. A failing
//! step aborts the mux; nothing is returned for a partial run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::MediaError;
use crate::transcoder::Transcoder;

/// Artifact names inside a workspace.
pub const SILENT_VIDEO_FILE: &str = "silent.mp4";
pub const VOICED_VIDEO_FILE: &str = "voiced.mp4";
pub const FINAL_VIDEO_FILE: &str = "final.mp4";

/// Where the muxer writes its intermediates and output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxLayout {
    pub silent_video: PathBuf,
    pub voiced_video: PathBuf,
    pub final_video: PathBuf,
}

impl MuxLayout {
    /// Standard artifact names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            silent_video: dir.join(SILENT_VIDEO_FILE),
            voiced_video: dir.join(VOICED_VIDEO_FILE),
            final_video: dir.join(FINAL_VIDEO_FILE),
        }
    }

    fn intermediates(&self) -> [&Path; 2] {
        [&self.silent_video, &self.voiced_video]
    }
}

/// The step a mux failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxStep {
    /// Input files checked before any tool runs
    Validate,
    StripAudio,
    OverlayVoice,
    MixAmbience,
}

impl MuxStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuxStep::Validate => "input validation",
            MuxStep::StripAudio => "audio strip",
            MuxStep::OverlayVoice => "voice overlay",
            MuxStep::MixAmbience => "ambience mix",
        }
    }
}

impl fmt::Display for MuxStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mux failure tagged with the step that produced it.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct MuxError {
    pub step: MuxStep,
    #[source]
    pub source: MediaError,
}

impl MuxError {
    fn new(step: MuxStep, source: MediaError) -> Self {
        Self { step, source }
    }

    /// Whether the mux failed because an input was missing or unreadable.
    pub fn is_input_error(&self) -> bool {
        self.step == MuxStep::Validate
    }
}

/// Combines one silent video stream, a narration track and an ambience track.
#[derive(Clone)]
pub struct MediaMuxer {
    transcoder: Arc<dyn Transcoder>,
    keep_intermediates: bool,
}

impl MediaMuxer {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            keep_intermediates: false,
        }
    }

    /// Leave the silent and voice-only intermediates on disk.
    pub fn keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    /// Run strip, overlay and mix. Returns the final video path.
    pub async fn mux(
        &self,
        video: &Path,
        voice: &Path,
        crowd: &Path,
        layout: &MuxLayout,
    ) -> Result<PathBuf, MuxError> {
        for input in [video, voice, crowd] {
            if !input.is_file() {
                return Err(MuxError::new(
                    MuxStep::Validate,
                    MediaError::FileNotFound(input.to_path_buf()),
                ));
            }
        }

        let started = Instant::now();

        self.transcoder
            .strip_audio(video, &layout.silent_video)
            .await
            .map_err(|e| MuxError::new(MuxStep::StripAudio, e))?;
        debug!("Audio removed: {}", layout.silent_video.display());

        self.transcoder
            .overlay_voice(&layout.silent_video, voice, &layout.voiced_video)
            .await
            .map_err(|e| MuxError::new(MuxStep::OverlayVoice, e))?;
        debug!("Voice-over added: {}", layout.voiced_video.display());

        self.transcoder
            .mix_ambience(&layout.voiced_video, crowd, &layout.final_video)
            .await
            .map_err(|e| MuxError::new(MuxStep::MixAmbience, e))?;

        if !layout.final_video.is_file() {
            return Err(MuxError::new(
                MuxStep::MixAmbience,
                MediaError::FileNotFound(layout.final_video.clone()),
            ));
        }

        if !self.keep_intermediates {
            remove_intermediates(layout).await;
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Commentary mux complete: {}",
            layout.final_video.display()
        );

        Ok(layout.final_video.clone())
    }
}

/// Best-effort removal; a leftover intermediate is reclaimed with the workspace.
async fn remove_intermediates(layout: &MuxLayout) {
    for path in layout.intermediates() {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Deleted intermediate: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete intermediate {}: {}", path.display(), e),
        }
    }
}
