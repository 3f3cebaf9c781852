//! Pipeline tests against recording mocks. No network, no ffmpeg.

mod mocks;

use std::path::PathBuf;
use std::time::Duration;

use sideline_media::MuxStep;
use sideline_models::{
    CommentaryRequest, Job, JobState, Language, ProgressEvent, ProgressMessage, Stage,
    SubscriberId,
};
use sideline_worker::{
    CommentaryService, FailureCategory, ProgressReporter, WorkerConfig, WorkerError, Workspace,
    CROWD_PROMPT,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

use mocks::{Call, Recorder, Scenario};

struct Fixture {
    root: TempDir,
    video: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let video = root.path().join("trickshot.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        Self { root, video }
    }

    fn work_dir(&self) -> PathBuf {
        self.root.path().join("work")
    }

    fn job(&self) -> Job {
        Job::new(CommentaryRequest::new(&self.video))
    }

    /// A job whose progress goes to a fresh subscriber.
    fn watched_job(&self) -> (Job, SubscriberId) {
        let subscriber = SubscriberId::new();
        let request = CommentaryRequest::new(&self.video).with_subscriber(subscriber.clone());
        (Job::new(request), subscriber)
    }

    fn workspace(&self, job: &Job) -> Workspace {
        Workspace::create(&self.work_dir(), &job.id).unwrap()
    }

    fn config(&self) -> WorkerConfig {
        WorkerConfig {
            work_dir: self.work_dir(),
            ..WorkerConfig::default()
        }
    }
}

async fn drain(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressMessage> {
    let mut messages = Vec::new();
    while let Some(event) = rx.recv().await {
        messages.push(event.message);
    }
    messages
}

fn stage_ordinals(messages: &[ProgressMessage]) -> Vec<u8> {
    messages
        .iter()
        .filter_map(|m| match m {
            ProgressMessage::Stage { ordinal, .. } => Some(*ordinal),
            _ => None,
        })
        .collect()
}

/// Call names with the concurrent voice/crowd pair put in a fixed order.
fn normalized_names(recorder: &Recorder) -> Vec<&'static str> {
    let mut names = recorder.names();
    if let (Some(v), Some(c)) = (
        names.iter().position(|n| *n == "voice"),
        names.iter().position(|n| *n == "crowd"),
    ) {
        if c < v {
            names.swap(v, c);
        }
    }
    names
}

#[tokio::test]
async fn test_end_to_end_trims_script_and_muxes() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let pipeline = Scenario::default().pipeline(&recorder, ProgressReporter::new());
    let mut job = fixture.job();
    let workspace = fixture.workspace(&job);

    let output = pipeline.run(&mut job, &workspace).await.unwrap();

    assert_eq!(output, workspace.mux_layout().final_video);
    assert!(output.exists());
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.stage, Some(Stage::Mux));
    assert_eq!(job.word_budget, Some(12));
    assert_eq!(job.output.as_ref(), Some(&output));

    // 4.0s of video: 12 words, hard-truncated because nothing ends a sentence.
    let spoken = recorder.voice_text().unwrap();
    assert_eq!(spoken.split_whitespace().count(), 12);
    assert!(spoken.ends_with("hype12"));

    assert_eq!(
        normalized_names(&recorder),
        vec!["analyze", "script", "voice", "crowd", "strip", "overlay", "mix"]
    );
    assert!(recorder.calls().contains(&Call::Crowd {
        prompt: CROWD_PROMPT.to_string(),
        duration_secs: 20.0,
    }));
}

#[tokio::test]
async fn test_script_request_carries_budget_language_and_name() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let scenario = Scenario {
        duration_secs: 25.0,
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, ProgressReporter::new());
    let mut job = Job::new(
        CommentaryRequest::new(&fixture.video)
            .with_language(Language::Fr)
            .with_display_name("Ace"),
    );
    let workspace = fixture.workspace(&job);

    pipeline.run(&mut job, &workspace).await.unwrap();

    let request = recorder.script_request().unwrap();
    assert_eq!(request.max_words, 75);
    assert_eq!(request.language, Language::Fr);
    assert_eq!(request.display_name.as_deref(), Some("Ace"));
    assert_eq!(
        request.description,
        "[00:00] A player flips and sinks a half-court shot."
    );
}

#[tokio::test]
async fn test_short_clip_gets_minimum_budget() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let scenario = Scenario {
        duration_secs: 1.0,
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, ProgressReporter::new());
    let mut job = fixture.job();
    let workspace = fixture.workspace(&job);

    pipeline.run(&mut job, &workspace).await.unwrap();

    assert_eq!(recorder.script_request().unwrap().max_words, 10);
    assert_eq!(recorder.voice_text().unwrap().split_whitespace().count(), 10);
}

#[tokio::test]
async fn test_subscriber_sees_every_stage_in_order_then_done() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let reporter = ProgressReporter::new();
    let pipeline = Scenario::default().pipeline(&recorder, reporter.clone());
    let (mut job, subscriber) = fixture.watched_job();
    let workspace = fixture.workspace(&job);
    let rx = reporter.subscribe_channel(subscriber.clone()).await;

    let output = pipeline.run(&mut job, &workspace).await.unwrap();
    let messages = drain(rx).await;

    assert_eq!(stage_ordinals(&messages), vec![1, 2, 3, 4, 5]);
    for message in &messages[..5] {
        match message {
            ProgressMessage::Stage { total, .. } => assert_eq!(*total, 5),
            other => panic!("unexpected message: {:?}", other),
        }
    }
    match messages.last() {
        Some(ProgressMessage::Done { output: done, .. }) => {
            assert_eq!(done, &output.display().to_string())
        }
        other => panic!("expected done, got {:?}", other),
    }
    assert!(!reporter.is_subscribed(&subscriber).await);
}

#[tokio::test]
async fn test_stage_order_holds_when_crowd_finishes_first() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let reporter = ProgressReporter::new();
    let scenario = Scenario {
        voice_delay: Duration::from_millis(100),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, reporter.clone());
    let (mut job, subscriber) = fixture.watched_job();
    let workspace = fixture.workspace(&job);
    let rx = reporter.subscribe_channel(subscriber.clone()).await;

    pipeline.run(&mut job, &workspace).await.unwrap();

    assert_eq!(stage_ordinals(&drain(rx).await), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_analysis_failure_stops_before_synthesis() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let reporter = ProgressReporter::new();
    let scenario = Scenario {
        description: Err("index 6650 is not ready".to_string()),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, reporter.clone());
    let (mut job, subscriber) = fixture.watched_job();
    let workspace = fixture.workspace(&job);
    let rx = reporter.subscribe_channel(subscriber.clone()).await;

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert!(matches!(err, WorkerError::AnalysisFailed(_)));
    assert_eq!(err.category(), FailureCategory::CollaboratorFailure);
    assert_eq!(err.stage(), Some(Stage::Analyze));
    assert!(err.to_string().contains("index 6650 is not ready"));
    assert_eq!(recorder.names(), vec!["analyze"]);
    assert_eq!(job.state, JobState::Failed);
    assert!(job.output.is_none());

    let messages = drain(rx).await;
    assert!(stage_ordinals(&messages).is_empty());
    match messages.as_slice() {
        [ProgressMessage::Failed { stage, message, .. }] => {
            assert_eq!(*stage, Some(Stage::Analyze));
            assert!(message.contains("index 6650 is not ready"));
        }
        other => panic!("expected a single failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_script_failure_is_reported_with_stage() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let scenario = Scenario {
        script: Err("quota exhausted".to_string()),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, ProgressReporter::new());
    let mut job = fixture.job();
    let workspace = fixture.workspace(&job);

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert!(matches!(err, WorkerError::ScriptFailed(_)));
    assert_eq!(err.stage(), Some(Stage::Script));
    assert_eq!(job.stage, Some(Stage::Analyze));
    assert_eq!(recorder.names(), vec!["analyze", "script"]);
}

#[tokio::test]
async fn test_blank_script_fails_before_synthesis() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let scenario = Scenario {
        script: Ok("  \"\"  ".to_string()),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, ProgressReporter::new());
    let mut job = fixture.job();
    let workspace = fixture.workspace(&job);

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert!(matches!(err, WorkerError::ScriptFailed(_)));
    assert!(!recorder.names().contains(&"voice"));
}

#[tokio::test]
async fn test_voice_failure_skips_mux() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let reporter = ProgressReporter::new();
    let scenario = Scenario {
        voice_failure: Some("voice_not_found".to_string()),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, reporter.clone());
    let (mut job, subscriber) = fixture.watched_job();
    let workspace = fixture.workspace(&job);
    let rx = reporter.subscribe_channel(subscriber.clone()).await;

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert!(matches!(err, WorkerError::VoiceSynthesisFailed(_)));
    assert_eq!(err.stage(), Some(Stage::Voice));
    assert!(err.to_string().contains("voice_not_found"));
    assert!(!recorder.names().contains(&"strip"));

    let messages = drain(rx).await;
    assert_eq!(stage_ordinals(&messages), vec![1, 2]);
    assert!(matches!(
        messages.last(),
        Some(ProgressMessage::Failed {
            stage: Some(Stage::Voice),
            ..
        })
    ));
}

#[tokio::test]
async fn test_crowd_failure_is_its_own_stage() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let scenario = Scenario {
        crowd_failure: Some("sound generation unavailable".to_string()),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, ProgressReporter::new());
    let mut job = fixture.job();
    let workspace = fixture.workspace(&job);

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert!(matches!(err, WorkerError::CrowdSynthesisFailed(_)));
    assert_eq!(err.stage(), Some(Stage::Crowd));
    assert!(!recorder.names().contains(&"strip"));
}

#[tokio::test]
async fn test_mux_failure_aborts_without_output() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let reporter = ProgressReporter::new();
    let scenario = Scenario {
        mux_failure: Some(MuxStep::OverlayVoice),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, reporter.clone());
    let (mut job, subscriber) = fixture.watched_job();
    let workspace = fixture.workspace(&job);
    let rx = reporter.subscribe_channel(subscriber.clone()).await;

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert!(matches!(err, WorkerError::MuxFailed(_)));
    assert_eq!(err.category(), FailureCategory::MediaToolFailure);
    assert!(err.to_string().contains("Invalid argument"));
    assert!(!recorder.names().contains(&"mix"));
    assert!(!workspace.mux_layout().final_video.exists());
    assert_eq!(stage_ordinals(&drain(rx).await), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_missing_voice_track_fails_at_mux_stage() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let reporter = ProgressReporter::new();
    let scenario = Scenario {
        voice_writes_nothing: true,
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, reporter.clone());
    let (mut job, subscriber) = fixture.watched_job();
    let workspace = fixture.workspace(&job);
    let rx = reporter.subscribe_channel(subscriber).await;

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert_eq!(err.category(), FailureCategory::InputInvalid);
    assert_eq!(err.stage(), Some(Stage::Mux));
    assert!(!recorder.names().contains(&"strip"));

    let messages = drain(rx).await;
    assert_eq!(stage_ordinals(&messages), vec![1, 2, 3, 4]);
    assert!(matches!(
        messages.last(),
        Some(ProgressMessage::Failed {
            stage: Some(Stage::Mux),
            ..
        })
    ));
}

#[tokio::test]
async fn test_missing_source_is_input_invalid() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let pipeline = Scenario::default().pipeline(&recorder, ProgressReporter::new());
    let mut job = Job::new(CommentaryRequest::new(fixture.root.path().join("gone.mp4")));
    let workspace = fixture.workspace(&job);

    let err = pipeline.run(&mut job, &workspace).await.unwrap_err();

    assert_eq!(err.category(), FailureCategory::InputInvalid);
    assert_eq!(err.stage(), None);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_subscriber_does_not_change_outcome() {
    let fixture = Fixture::new();

    let silent_recorder = Recorder::default();
    let silent = Scenario::default().pipeline(&silent_recorder, ProgressReporter::new());
    let mut silent_job = fixture.job();
    let silent_ws = fixture.workspace(&silent_job);
    let silent_output = silent.run(&mut silent_job, &silent_ws).await.unwrap();

    let watched_recorder = Recorder::default();
    let reporter = ProgressReporter::new();
    let watched = Scenario::default().pipeline(&watched_recorder, reporter.clone());
    let (mut watched_job, subscriber) = fixture.watched_job();
    let watched_ws = fixture.workspace(&watched_job);
    let _rx = reporter.subscribe_channel(subscriber).await;
    let watched_output = watched.run(&mut watched_job, &watched_ws).await.unwrap();

    assert_eq!(silent_job.state, watched_job.state);
    assert_eq!(silent_job.word_budget, watched_job.word_budget);
    assert_eq!(
        normalized_names(&silent_recorder),
        normalized_names(&watched_recorder)
    );
    assert_eq!(silent_recorder.voice_text(), watched_recorder.voice_text());
    assert_eq!(silent_output.file_name(), watched_output.file_name());
    assert_ne!(silent_output, watched_output);
}

#[tokio::test]
async fn test_concurrent_jobs_use_separate_workspaces() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let pipeline = Scenario::default().pipeline(&recorder, ProgressReporter::new());
    let service = CommentaryService::with_pipeline(&fixture.config(), pipeline);

    let (a, b) = tokio::join!(
        service.submit(CommentaryRequest::new(&fixture.video)),
        service.submit(CommentaryRequest::new(&fixture.video)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.job.id, b.job.id);
    assert_ne!(a.workspace_path(), b.workspace_path());
    assert_ne!(a.output(), b.output());
    assert!(a.output().exists());
    assert!(b.output().exists());
}

#[tokio::test]
async fn test_one_subscriber_cannot_have_two_jobs_in_flight() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let pipeline = Scenario::default().pipeline(&recorder, ProgressReporter::new());
    let service = CommentaryService::with_pipeline(&fixture.config(), pipeline);
    let shared = SubscriberId::from_string("client-7");
    let mut rx = service.subscribe(shared.clone()).await;

    let (a, b) = tokio::join!(
        service.submit(CommentaryRequest::new(&fixture.video).with_subscriber(shared.clone())),
        service.submit(CommentaryRequest::new(&fixture.video).with_subscriber(shared.clone())),
    );

    let (completed, rejected) = match (a, b) {
        (Ok(completed), Err(rejected)) | (Err(rejected), Ok(completed)) => (completed, rejected),
        (a, b) => panic!(
            "expected one job to run and one to be rejected, got {} / {}",
            a.is_ok(),
            b.is_ok()
        ),
    };
    assert_eq!(rejected.category(), FailureCategory::InputInvalid);
    assert!(rejected.to_string().contains("client-7"));
    assert_eq!(completed.job.subscriber.as_ref(), Some(&shared));

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert!(events.iter().all(|e| e.job_id == completed.job.id));
    let messages: Vec<ProgressMessage> = events.into_iter().map(|e| e.message).collect();
    assert_eq!(stage_ordinals(&messages), vec![1, 2, 3, 4, 5]);
    assert!(matches!(messages.last(), Some(ProgressMessage::Done { .. })));

    // Once the first job is done the subscriber may submit again, under a new job id.
    let rx = service.subscribe(shared.clone()).await;
    let again = service
        .submit(CommentaryRequest::new(&fixture.video).with_subscriber(shared.clone()))
        .await
        .unwrap();
    assert_ne!(again.job.id, completed.job.id);
    assert_eq!(stage_ordinals(&drain(rx).await), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_concurrent_subscribers_only_see_their_own_job() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let pipeline = Scenario::default().pipeline(&recorder, ProgressReporter::new());
    let service = CommentaryService::with_pipeline(&fixture.config(), pipeline);
    let (first, second) = (SubscriberId::new(), SubscriberId::new());
    let mut rx_first = service.subscribe(first.clone()).await;
    let mut rx_second = service.subscribe(second.clone()).await;

    let (a, b) = tokio::join!(
        service.submit(CommentaryRequest::new(&fixture.video).with_subscriber(first.clone())),
        service.submit(CommentaryRequest::new(&fixture.video).with_subscriber(second.clone())),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.job.id, b.job.id);

    for (rx, job_id) in [(&mut rx_first, &a.job.id), (&mut rx_second, &b.job.id)] {
        let mut ordinals = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(&event.job_id, job_id);
            ordinals.extend(event.ordinal());
        }
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
    }
}

#[tokio::test]
async fn test_service_delivers_and_reclaims_workspace() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let pipeline = Scenario::default().pipeline(&recorder, ProgressReporter::new());
    let service = CommentaryService::with_pipeline(&fixture.config(), pipeline);
    let subscriber = SubscriberId::new();
    let rx = service.subscribe(subscriber.clone()).await;

    let completed = service
        .submit(CommentaryRequest::new(&fixture.video).with_subscriber(subscriber))
        .await
        .unwrap();
    let workspace = completed.workspace_path().to_path_buf();
    let destination = fixture.root.path().join("out").join("commentated-trickshot.mp4");

    let delivered = completed.deliver_to(&destination).await.unwrap();

    assert_eq!(delivered, destination);
    assert!(destination.exists());
    assert!(!workspace.exists());
    assert_eq!(stage_ordinals(&drain(rx).await), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_service_failure_reclaims_workspace() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();
    let scenario = Scenario {
        mux_failure: Some(MuxStep::MixAmbience),
        ..Scenario::default()
    };
    let pipeline = scenario.pipeline(&recorder, ProgressReporter::new());
    let service = CommentaryService::with_pipeline(&fixture.config(), pipeline);

    let err = service
        .submit(CommentaryRequest::new(&fixture.video))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Mux));
    let leftovers = std::fs::read_dir(fixture.work_dir()).unwrap().count();
    assert_eq!(leftovers, 0);
}
