//! The three external-tool transforms behind commentary muxing.
//!
//! `Transcoder` isolates the command-line dependency so the muxer can be
//! driven by a fake in tests. `FfmpegTranscoder` is the production
//! implementation.

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{
    ambience_mix_filter, frame_hold_filter, AMBIENCE_FADE_IN_SECS, AMBIENCE_VOLUME,
    FRAME_HOLD_SECS, HELD_VIDEO_LABEL, MIXED_AUDIO_LABEL,
};

/// Media transforms used by `MediaMuxer`. Each call runs to completion and
/// writes exactly one output file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Copy the video stream of `input` unchanged, dropping all audio.
    async fn strip_audio(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Hold the last frame of `video` and lay `voice` over it, stopping at
    /// the shorter stream.
    async fn overlay_voice(&self, video: &Path, voice: &Path, output: &Path) -> MediaResult<()>;

    /// Mix a faded, attenuated `ambience` track under the existing audio of
    /// `video`, copying the video stream.
    async fn mix_ambience(&self, video: &Path, ambience: &Path, output: &Path) -> MediaResult<()>;
}

/// Encoding and mix parameters.
#[derive(Debug, Clone)]
pub struct MixSettings {
    /// Seconds the final frame is cloned for
    pub frame_hold_secs: u32,
    /// Ambience fade-in length in seconds
    pub fade_in_secs: f64,
    /// Ambience level, 1.0 = nominal
    pub ambience_volume: f64,
    /// Encoder used when the frame hold forces a re-encode
    pub video_codec: String,
    /// Encoder for every audio output
    pub audio_codec: String,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            frame_hold_secs: FRAME_HOLD_SECS,
            fade_in_secs: AMBIENCE_FADE_IN_SECS,
            ambience_volume: AMBIENCE_VOLUME,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

/// `Transcoder` that shells out to ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
    settings: MixSettings,
}

impl FfmpegTranscoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            settings: MixSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: MixSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &MixSettings {
        &self.settings
    }

    /// Command for `strip_audio`.
    pub fn strip_audio_command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, output).copy_video().no_audio()
    }

    /// Command for `overlay_voice`.
    pub fn overlay_voice_command(&self, video: &Path, voice: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output)
            .add_input(voice)
            .filter_complex(frame_hold_filter(self.settings.frame_hold_secs))
            .map(HELD_VIDEO_LABEL)
            .map("1:a:0")
            .shortest()
            .video_codec(&self.settings.video_codec)
            .audio_codec(&self.settings.audio_codec)
    }

    /// Command for `mix_ambience`.
    pub fn mix_ambience_command(&self, video: &Path, ambience: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output)
            .add_input(ambience)
            .filter_complex(ambience_mix_filter(
                self.settings.fade_in_secs,
                self.settings.ambience_volume,
            ))
            .map("0:v")
            .map(MIXED_AUDIO_LABEL)
            .copy_video()
            .audio_codec(&self.settings.audio_codec)
            .shortest()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn strip_audio(&self, input: &Path, output: &Path) -> MediaResult<()> {
        info!("Removing audio: {} -> {}", input.display(), output.display());
        self.runner.run(&self.strip_audio_command(input, output)).await
    }

    async fn overlay_voice(&self, video: &Path, voice: &Path, output: &Path) -> MediaResult<()> {
        info!(
            "Adding voice-over {} to {} -> {}",
            voice.display(),
            video.display(),
            output.display()
        );
        self.runner
            .run(&self.overlay_voice_command(video, voice, output))
            .await
    }

    async fn mix_ambience(&self, video: &Path, ambience: &Path, output: &Path) -> MediaResult<()> {
        info!(
            "Mixing crowd ambience {} under {} -> {}",
            ambience.display(),
            video.display(),
            output.display()
        );
        self.runner
            .run(&self.mix_ambience_command(video, ambience, output))
            .await
    }
}
