//! Commentary job pipeline.
//!
//! Runs the five stages of one job in order:
//!
//! 1. **Analyze**: describe the clip.
//! 2. **Script**: budget words from the clip duration, ask for commentary,
//!    trim the answer to the budget.
//! 3. **Voice** and 4. **Crowd**: synthesized concurrently. The voice event
//!    goes out as soon as narration is ready; the crowd event only after both
//!    tracks exist, so subscribers always see stages in order.
//! 5. **Mux**: strip, overlay and mix into the final video.
//!
//! A failing stage stops the job. Nothing is retried.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sideline_media::{MediaMuxer, MediaProbe};
use sideline_models::{Job, JobId, Stage, SubscriberId};
use tracing::Instrument;

use crate::collaborators::{CollaboratorError, Collaborators, ScriptRequest, CROWD_PROMPT};
use crate::config::DEFAULT_CROWD_DURATION_SECS;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::ProgressReporter;
use crate::script::{finalize_script, ScriptConfig};
use crate::workspace::Workspace;

/// Runs jobs against a fixed set of collaborators.
pub struct JobPipeline {
    collaborators: Collaborators,
    probe: Arc<dyn MediaProbe>,
    muxer: MediaMuxer,
    reporter: ProgressReporter,
    script: ScriptConfig,
    crowd_duration_secs: f64,
}

impl JobPipeline {
    pub fn new(
        collaborators: Collaborators,
        probe: Arc<dyn MediaProbe>,
        muxer: MediaMuxer,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            collaborators,
            probe,
            muxer,
            reporter,
            script: ScriptConfig::default(),
            crowd_duration_secs: DEFAULT_CROWD_DURATION_SECS,
        }
    }

    pub fn with_script_config(mut self, script: ScriptConfig) -> Self {
        self.script = script;
        self
    }

    /// Requested ambience length. Independent of narration length.
    pub fn with_crowd_duration(mut self, secs: f64) -> Self {
        self.crowd_duration_secs = secs;
        self
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Run `job` inside `workspace` and return the final video path.
    ///
    /// The job's state, stage and word budget are updated as it goes. The
    /// returned path lives in the workspace.
    pub async fn run(&self, job: &mut Job, workspace: &Workspace) -> WorkerResult<PathBuf> {
        let logger = JobLogger::new(&job.id, "commentary");
        let span = logger.create_span();
        let started = Instant::now();

        job.start();
        metrics::record_job_started();
        logger.log_start(&format!(
            "{} (language={})",
            job.source_video.display(),
            job.language
        ));

        let result = self
            .execute(job, workspace, &logger)
            .instrument(span)
            .await;

        match &result {
            Ok(output) => {
                job.succeed(output.clone());
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                logger.log_completion(&output.display().to_string());
                if let Some(subscriber) = &job.subscriber {
                    self.reporter
                        .finish(subscriber, &job.id, output.display().to_string())
                        .await;
                }
            }
            Err(e) => {
                job.fail();
                metrics::record_job_failed(e);
                logger.log_error(&format!("[{}] {}", e.category(), e));
                if let Some(subscriber) = &job.subscriber {
                    self.reporter
                        .fail(subscriber, &job.id, e.stage(), e.to_string())
                        .await;
                }
            }
        }

        result
    }

    async fn execute(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        logger: &JobLogger,
    ) -> WorkerResult<PathBuf> {
        let video = job.source_video.clone();
        let job_id = job.id.clone();
        let subscriber = job.subscriber.clone();
        if !video.is_file() {
            return Err(WorkerError::input_invalid(format!(
                "source video not found: {}",
                video.display()
            )));
        }

        let duration = self
            .probe
            .duration(&video)
            .await
            .map_err(WorkerError::from_probe)?;
        logger.log_progress(&format!("source duration {:.2}s", duration));

        // Stage 1
        let stage_started = Instant::now();
        let description = self
            .collaborators
            .analyzer
            .analyze(&video)
            .await
            .map_err(WorkerError::AnalysisFailed)?;
        self.stage_complete(&job_id, subscriber.as_ref(), Stage::Analyze, stage_started, logger)
            .await;
        job.complete_stage(Stage::Analyze);

        // Stage 2
        let stage_started = Instant::now();
        let budget = self.script.word_budget(duration);
        job.word_budget = Some(budget);

        let request = ScriptRequest {
            description,
            max_words: budget,
            language: job.language,
            display_name: job.display_name.clone(),
        };
        let raw = self
            .collaborators
            .writer
            .write_script(&request)
            .await
            .map_err(WorkerError::ScriptFailed)?;

        let script = finalize_script(&raw, budget);
        if script.is_empty() {
            return Err(WorkerError::ScriptFailed(CollaboratorError::rejected(
                "script was empty after clean-up",
            )));
        }
        logger.log_progress(&format!(
            "script has {} of {} words",
            script.split_whitespace().count(),
            budget
        ));
        self.stage_complete(&job_id, subscriber.as_ref(), Stage::Script, stage_started, logger)
            .await;
        job.complete_stage(Stage::Script);

        // Stages 3 and 4
        let stage_started = Instant::now();
        let voice_output = workspace.voice_track();
        let crowd_output = workspace.crowd_track();

        let voice = async {
            let track = self
                .collaborators
                .voice
                .synthesize_voice(&script, &voice_output)
                .await
                .map_err(WorkerError::VoiceSynthesisFailed)?;
            self.stage_complete(&job_id, subscriber.as_ref(), Stage::Voice, stage_started, logger)
                .await;
            Ok::<_, WorkerError>(track)
        };
        let crowd = async {
            self.collaborators
                .crowd
                .synthesize_crowd(CROWD_PROMPT, self.crowd_duration_secs, &crowd_output)
                .await
                .map_err(WorkerError::CrowdSynthesisFailed)
        };

        let (voice_track, crowd_track) = tokio::try_join!(voice, crowd)?;
        job.complete_stage(Stage::Voice);
        self.stage_complete(&job_id, subscriber.as_ref(), Stage::Crowd, stage_started, logger)
            .await;
        job.complete_stage(Stage::Crowd);

        // Stage 5
        let stage_started = Instant::now();
        let output = self
            .muxer
            .mux(&video, &voice_track, &crowd_track, &workspace.mux_layout())
            .await
            .map_err(WorkerError::from_mux)?;
        self.stage_complete(&job_id, subscriber.as_ref(), Stage::Mux, stage_started, logger)
            .await;
        job.complete_stage(Stage::Mux);

        Ok(output)
    }

    async fn stage_complete(
        &self,
        job_id: &JobId,
        subscriber: Option<&SubscriberId>,
        stage: Stage,
        started: Instant,
        logger: &JobLogger,
    ) {
        let elapsed = started.elapsed();
        logger.log_stage(stage, elapsed);
        metrics::record_stage_duration(stage, elapsed.as_secs_f64());
        if let Some(subscriber) = subscriber {
            self.reporter
                .notify(subscriber, job_id, stage, stage.completion_message())
                .await;
        }
    }
}
