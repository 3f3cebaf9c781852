//! Recording collaborators and transcoder for pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sideline_media::{MediaError, MediaMuxer, MediaProbe, MediaResult, MuxStep, Transcoder};
use sideline_worker::collaborators::CollaboratorResult;
use sideline_worker::{
    CollaboratorError, Collaborators, CrowdSynthesizer, JobPipeline, ProgressReporter,
    ScriptRequest, ScriptWriter, VideoAnalyzer, VoiceSynthesizer,
};

/// One observed call, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Analyze(PathBuf),
    Script(ScriptRequest),
    Voice(String),
    Crowd { prompt: String, duration_secs: f64 },
    Strip,
    Overlay,
    Mix,
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::Analyze(_) => "analyze",
            Call::Script(_) => "script",
            Call::Voice(_) => "voice",
            Call::Crowd { .. } => "crowd",
            Call::Strip => "strip",
            Call::Overlay => "overlay",
            Call::Mix => "mix",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::name).collect()
    }

    pub fn script_request(&self) -> Option<ScriptRequest> {
        self.calls().into_iter().find_map(|c| match c {
            Call::Script(request) => Some(request),
            _ => None,
        })
    }

    pub fn voice_text(&self) -> Option<String> {
        self.calls().into_iter().find_map(|c| match c {
            Call::Voice(text) => Some(text),
            _ => None,
        })
    }
}

struct MockAnalyzer {
    recorder: Recorder,
    result: Result<String, String>,
}

#[async_trait]
impl VideoAnalyzer for MockAnalyzer {
    async fn analyze(&self, video: &Path) -> CollaboratorResult<String> {
        self.recorder.push(Call::Analyze(video.to_path_buf()));
        self.result.clone().map_err(CollaboratorError::rejected)
    }
}

struct MockWriter {
    recorder: Recorder,
    result: Result<String, String>,
}

#[async_trait]
impl ScriptWriter for MockWriter {
    async fn write_script(&self, request: &ScriptRequest) -> CollaboratorResult<String> {
        self.recorder.push(Call::Script(request.clone()));
        self.result.clone().map_err(CollaboratorError::rejected)
    }
}

struct MockVoice {
    recorder: Recorder,
    failure: Option<String>,
    delay: Duration,
    /// Report success without producing the file
    writes_nothing: bool,
}

#[async_trait]
impl VoiceSynthesizer for MockVoice {
    async fn synthesize_voice(&self, text: &str, output: &Path) -> CollaboratorResult<PathBuf> {
        self.recorder.push(Call::Voice(text.to_string()));
        tokio::time::sleep(self.delay).await;
        if let Some(message) = &self.failure {
            return Err(CollaboratorError::rejected(message.clone()));
        }
        if !self.writes_nothing {
            tokio::fs::write(output, b"narration").await?;
        }
        Ok(output.to_path_buf())
    }
}

struct MockCrowd {
    recorder: Recorder,
    failure: Option<String>,
    delay: Duration,
}

#[async_trait]
impl CrowdSynthesizer for MockCrowd {
    async fn synthesize_crowd(
        &self,
        prompt: &str,
        duration_secs: f64,
        output: &Path,
    ) -> CollaboratorResult<PathBuf> {
        self.recorder.push(Call::Crowd {
            prompt: prompt.to_string(),
            duration_secs,
        });
        tokio::time::sleep(self.delay).await;
        if let Some(message) = &self.failure {
            return Err(CollaboratorError::rejected(message.clone()));
        }
        tokio::fs::write(output, b"crowd").await?;
        Ok(output.to_path_buf())
    }
}

/// Writes every output file instead of running ffmpeg.
struct MockTranscoder {
    recorder: Recorder,
    fail_at: Option<MuxStep>,
}

impl MockTranscoder {
    async fn step(&self, step: MuxStep, call: Call, output: &Path) -> MediaResult<()> {
        self.recorder.push(call);
        if self.fail_at == Some(step) {
            return Err(MediaError::ffmpeg_failed(
                "ffmpeg exited with status 1",
                Some("Error while filtering: Invalid argument".to_string()),
                Some(1),
            ));
        }
        tokio::fs::write(output, step.as_str()).await?;
        Ok(())
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn strip_audio(&self, _input: &Path, output: &Path) -> MediaResult<()> {
        self.step(MuxStep::StripAudio, Call::Strip, output).await
    }

    async fn overlay_voice(&self, _video: &Path, _voice: &Path, output: &Path) -> MediaResult<()> {
        self.step(MuxStep::OverlayVoice, Call::Overlay, output).await
    }

    async fn mix_ambience(&self, _video: &Path, _ambience: &Path, output: &Path) -> MediaResult<()> {
        self.step(MuxStep::MixAmbience, Call::Mix, output).await
    }
}

struct FixedProbe(f64);

#[async_trait]
impl MediaProbe for FixedProbe {
    async fn duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(self.0)
    }
}

/// Thirty words, no terminating punctuation.
pub fn long_unterminated_script() -> String {
    (1..=30)
        .map(|i| format!("hype{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// How the mocks behave for one test.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub duration_secs: f64,
    pub description: Result<String, String>,
    pub script: Result<String, String>,
    pub voice_failure: Option<String>,
    pub voice_delay: Duration,
    pub voice_writes_nothing: bool,
    pub crowd_failure: Option<String>,
    pub crowd_delay: Duration,
    pub mux_failure: Option<MuxStep>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            duration_secs: 4.0,
            description: Ok("[00:00] A player flips and sinks a half-court shot.".to_string()),
            script: Ok(long_unterminated_script()),
            voice_failure: None,
            voice_delay: Duration::ZERO,
            voice_writes_nothing: false,
            crowd_failure: None,
            crowd_delay: Duration::ZERO,
            mux_failure: None,
        }
    }
}

impl Scenario {
    pub fn pipeline(&self, recorder: &Recorder, reporter: ProgressReporter) -> JobPipeline {
        let collaborators = Collaborators {
            analyzer: Arc::new(MockAnalyzer {
                recorder: recorder.clone(),
                result: self.description.clone(),
            }),
            writer: Arc::new(MockWriter {
                recorder: recorder.clone(),
                result: self.script.clone(),
            }),
            voice: Arc::new(MockVoice {
                recorder: recorder.clone(),
                failure: self.voice_failure.clone(),
                delay: self.voice_delay,
                writes_nothing: self.voice_writes_nothing,
            }),
            crowd: Arc::new(MockCrowd {
                recorder: recorder.clone(),
                failure: self.crowd_failure.clone(),
                delay: self.crowd_delay,
            }),
        };

        let muxer = MediaMuxer::new(Arc::new(MockTranscoder {
            recorder: recorder.clone(),
            fail_at: self.mux_failure,
        }));

        JobPipeline::new(
            collaborators,
            Arc::new(FixedProbe(self.duration_secs)),
            muxer,
            reporter,
        )
    }
}
