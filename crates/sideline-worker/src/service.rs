//! Hosting facade for concurrent commentary jobs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sideline_media::{move_file, FfmpegRunner, FfmpegTranscoder, FfprobeProbe, MediaMuxer};
use sideline_models::{CommentaryRequest, Job, ProgressEvent, SubscriberId};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::collaborators::Collaborators;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::JobPipeline;
use crate::progress::ProgressReporter;
use crate::workspace::Workspace;

/// Owns the subscriber registry, the job limit and the pipeline.
pub struct CommentaryService {
    pipeline: JobPipeline,
    job_semaphore: Semaphore,
    /// Subscribers that currently have a job queued or running
    claimed_subscribers: Mutex<HashSet<SubscriberId>>,
    in_flight: AtomicUsize,
    work_dir: PathBuf,
    keep_workspace: bool,
}

impl CommentaryService {
    /// Service backed by ffmpeg, ffprobe and the given collaborators.
    pub fn new(config: &WorkerConfig, collaborators: Collaborators) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = config.ffmpeg_timeout {
            runner = runner.with_timeout(timeout.as_secs());
        }

        let muxer = MediaMuxer::new(Arc::new(FfmpegTranscoder::new(runner)))
            .keep_intermediates(config.keep_workspace);

        let pipeline = JobPipeline::new(
            collaborators,
            Arc::new(FfprobeProbe),
            muxer,
            ProgressReporter::new(),
        )
        .with_script_config(config.script)
        .with_crowd_duration(config.crowd_duration_secs);

        Self::with_pipeline(config, pipeline)
    }

    /// Service around a prebuilt pipeline.
    pub fn with_pipeline(config: &WorkerConfig, pipeline: JobPipeline) -> Self {
        Self {
            pipeline,
            job_semaphore: Semaphore::new(config.max_concurrent_jobs.max(1)),
            claimed_subscribers: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            work_dir: config.work_dir.clone(),
            keep_workspace: config.keep_workspace,
        }
    }

    pub fn reporter(&self) -> &ProgressReporter {
        self.pipeline.reporter()
    }

    /// Subscribe to progress under an id the caller will submit with.
    pub async fn subscribe(&self, subscriber: SubscriberId) -> mpsc::Receiver<ProgressEvent> {
        self.reporter().subscribe_channel(subscriber).await
    }

    /// Run one request to completion.
    ///
    /// Every job gets a fresh id. A request naming a subscriber that already
    /// has a job queued or running is rejected, so one subscriber only ever
    /// sees a single job's events, in stage order. Waits for a free slot when
    /// the concurrent job limit is reached.
    pub async fn submit(&self, request: CommentaryRequest) -> WorkerResult<CompletedJob> {
        let subscriber = request.subscriber.clone();
        if let Some(subscriber) = &subscriber {
            if !self.claimed_subscribers.lock().await.insert(subscriber.clone()) {
                warn!(subscriber = %subscriber, "Rejected job: subscriber already has one in flight");
                return Err(WorkerError::input_invalid(format!(
                    "subscriber {} already has a job in flight",
                    subscriber
                )));
            }
        }

        let result = self.run(Job::new(request)).await;

        if let Some(subscriber) = &subscriber {
            self.claimed_subscribers.lock().await.remove(subscriber);
        }
        result
    }

    async fn run(&self, mut job: Job) -> WorkerResult<CompletedJob> {
        let _permit = self
            .job_semaphore
            .acquire()
            .await
            .map_err(|_| WorkerError::workspace_failed("job semaphore closed"))?;

        let workspace = match Workspace::create(&self.work_dir, &job.id) {
            Ok(ws) => ws.keep_on_drop(self.keep_workspace),
            Err(e) => {
                job.fail();
                metrics::record_job_failed(&e);
                if let Some(subscriber) = &job.subscriber {
                    self.reporter()
                        .fail(subscriber, &job.id, None, e.to_string())
                        .await;
                }
                return Err(e);
            }
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_jobs_in_flight(running);

        let result = self.pipeline.run(&mut job, &workspace).await;

        let running = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_jobs_in_flight(running);

        match result {
            Ok(output) => Ok(CompletedJob {
                job,
                output,
                workspace,
            }),
            Err(e) => {
                workspace.discard();
                Err(e)
            }
        }
    }
}

/// A finished job. Holds its workspace until the output is delivered.
#[derive(Debug)]
pub struct CompletedJob {
    pub job: Job,
    output: PathBuf,
    workspace: Workspace,
}

impl CompletedJob {
    /// Final video inside the workspace.
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Move the final video to `destination` and reclaim the workspace.
    pub async fn deliver_to(self, destination: &Path) -> WorkerResult<PathBuf> {
        move_file(&self.output, destination).await.map_err(|e| {
            WorkerError::workspace_failed(format!(
                "cannot deliver {} to {}: {}",
                self.output.display(),
                destination.display(),
                e
            ))
        })?;

        info!(job_id = %self.job.id, "Delivered {}", destination.display());
        self.workspace.discard();
        Ok(destination.to_path_buf())
    }

    /// Drop the output without delivering it.
    pub fn discard(self) {
        debug!(job_id = %self.job.id, "Discarding undelivered output");
        self.workspace.discard();
    }
}
