//! FFmpeg filter graph definitions for commentary muxing.

/// Seconds the last video frame is held for. Has to outlast any narration
/// the script writer can produce; `-shortest` trims the excess.
pub const FRAME_HOLD_SECS: u32 = 999;

/// Ambience fade-in length in seconds.
pub const AMBIENCE_FADE_IN_SECS: f64 = 1.0;

/// Ambience level relative to nominal volume.
pub const AMBIENCE_VOLUME: f64 = 0.25;

/// Output label of the frame-hold graph.
pub const HELD_VIDEO_LABEL: &str = "[v]";

/// Output label of the ambience mix graph.
pub const MIXED_AUDIO_LABEL: &str = "[a]";

/// Video filter graph that clones the final frame of input 0.
pub fn frame_hold_filter(hold_secs: u32) -> String {
    format!(
        "[0:v]tpad=stop_mode=clone:stop_duration={}{}",
        hold_secs, HELD_VIDEO_LABEL
    )
}

/// Audio filter graph that fades in and attenuates input 1, then mixes it
/// under input 0's audio. The mix itself runs for the longer of the two.
pub fn ambience_mix_filter(fade_in_secs: f64, volume: f64) -> String {
    format!(
        concat!(
            "[1:a]afade=t=in:st=0:d={fade},volume={volume}[a1];",
            "[0:a][a1]amix=inputs=2:duration=longest{label}"
        ),
        fade = format_number(fade_in_secs),
        volume = format_number(volume),
        label = MIXED_AUDIO_LABEL,
    )
}

/// Format without a trailing ".0" so graphs read `d=1` rather than `d=1.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
