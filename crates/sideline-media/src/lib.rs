//! FFmpeg CLI wrapper for commentary muxing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A runner that captures stderr and reports non-zero exits
//! - FFprobe duration probing
//! - The `Transcoder` seam (strip / overlay / mix) and its FFmpeg implementation
//! - `MediaMuxer`, which chains the three transforms into one output file

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod muxer;
pub mod probe;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use muxer::{MediaMuxer, MuxError, MuxLayout, MuxStep};
pub use probe::{probe_video, FfprobeProbe, MediaProbe, VideoInfo};
pub use transcoder::{FfmpegTranscoder, MixSettings, Transcoder};
