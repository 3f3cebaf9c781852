//! `sideline`: add sports commentary and crowd noise to a trickshot clip.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sideline_media::{check_ffmpeg, check_ffprobe};
use sideline_models::{CommentaryRequest, Language, ProgressMessage, SubscriberId};
use sideline_worker::{Collaborators, CommentaryService, WorkerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Source video
    #[arg(required_unless_present = "check")]
    video: Option<PathBuf>,

    #[arg(short, long, default_value = "en", help = "Commentary language (ISO 639-1)")]
    language: Language,

    #[arg(short, long, help = "Player name for the commentator to use")]
    name: Option<String>,

    #[arg(short, long, help = "Where to write the result [default: commentated-<stem>.mp4]")]
    output: Option<PathBuf>,

    #[arg(long, help = "Verify tools and credentials, then exit")]
    check: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sideline=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn default_output(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "trickshot".to_string());
    PathBuf::from(format!("commentated-{}.mp4", stem))
}

fn self_check(config: &WorkerConfig) -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    info!("ffmpeg: {}, ffprobe: {}", ffmpeg.display(), ffprobe.display());

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("cannot create {}", config.work_dir.display()))?;

    Collaborators::from_env()?;
    info!("Self-check ok");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if cli.check {
        return self_check(&config);
    }

    let Some(video) = cli.video else {
        bail!("no video given");
    };
    if !video.is_file() {
        bail!("video not found: {}", video.display());
    }
    let output = cli.output.unwrap_or_else(|| default_output(&video));

    check_ffmpeg()?;
    check_ffprobe()?;
    let service = CommentaryService::new(&config, Collaborators::from_env()?);

    let subscriber = SubscriberId::new();
    let mut events = service.subscribe(subscriber.clone()).await;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.message {
                ProgressMessage::Stage {
                    ordinal,
                    total,
                    message,
                    ..
                } => info!("[{}/{}] {}", ordinal, total, message),
                ProgressMessage::Done { .. } => break,
                ProgressMessage::Failed { message, .. } => {
                    warn!("Job failed: {}", message);
                    break;
                }
            }
        }
    });

    let mut request = CommentaryRequest::new(&video)
        .with_language(cli.language)
        .with_subscriber(subscriber);
    if let Some(name) = cli.name {
        request = request.with_display_name(name);
    }

    let result = service.submit(request).await;
    printer.await.ok();

    let completed = result?;
    let delivered = completed.deliver_to(&output).await?;

    println!("{}", delivered.display());
    Ok(())
}
