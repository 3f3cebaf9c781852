//! TwelveLabs video understanding client.
//!
//! Analysis is a four-step exchange: upload the clip as an asset, add the
//! asset to an index, poll until indexing settles, then stream the analysis
//! text for a fixed prompt.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{check_status, CollaboratorError, CollaboratorResult, VideoAnalyzer};
use crate::error::{WorkerError, WorkerResult};

const SERVICE: &str = "twelvelabs";
const DEFAULT_BASE_URL: &str = "https://api.twelvelabs.io/v1.3";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Prompt sent with every analysis request.
pub const ANALYSIS_PROMPT: &str = "Give me a detailed explanation of the trickshot. \
At each new step of the trickshot, annotate it with timestamps";

/// Resource id as returned by the create and retrieve endpoints.
#[derive(Debug, Deserialize)]
struct Created {
    #[serde(alias = "id", rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct IndexedAsset {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Serialize)]
struct IndexAssetRequest<'a> {
    asset_id: &'a str,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    video_id: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One line of the analysis stream.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    event_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// `VideoAnalyzer` backed by the TwelveLabs API.
pub struct TwelveLabsAnalyzer {
    api_key: String,
    index_id: String,
    base_url: String,
    poll_interval: Duration,
    client: Client,
}

impl TwelveLabsAnalyzer {
    pub fn new(api_key: impl Into<String>, index_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_id: index_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            client: Client::new(),
        }
    }

    /// Read `TWELVELABS_API_KEY` and `TWELVELABS_INDEX_ID` (or `INDEX_ID`).
    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("TWELVELABS_API_KEY")
            .map_err(|_| WorkerError::config_error("TWELVELABS_API_KEY not set"))?;
        let index_id = std::env::var("TWELVELABS_INDEX_ID")
            .or_else(|_| std::env::var("INDEX_ID"))
            .map_err(|_| WorkerError::config_error("TWELVELABS_INDEX_ID not set"))?;

        Ok(Self::new(api_key, index_id))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn upload_asset(&self, video: &Path) -> CollaboratorResult<String> {
        let bytes = tokio::fs::read(video).await?;
        let file_name = video
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());

        let file = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mp4")
            .map_err(|e| CollaboratorError::request(SERVICE, e))?;
        let form = Form::new().text("method", "direct").part("file", file);

        let response = self
            .client
            .post(format!("{}/assets", self.base_url))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CollaboratorError::request(SERVICE, e))?;

        let created: Created = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::invalid_response(SERVICE, e.to_string()))?;
        Ok(created.id)
    }

    async fn index_asset(&self, asset_id: &str) -> CollaboratorResult<String> {
        let response = self
            .client
            .post(format!(
                "{}/indexes/{}/indexed-assets",
                self.base_url, self.index_id
            ))
            .header("x-api-key", &self.api_key)
            .json(&IndexAssetRequest { asset_id })
            .send()
            .await
            .map_err(|e| CollaboratorError::request(SERVICE, e))?;

        let created: Created = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::invalid_response(SERVICE, e.to_string()))?;
        Ok(created.id)
    }

    /// Poll until the indexed asset is `ready`. There is no upper bound.
    async fn wait_until_ready(&self, indexed_asset_id: &str) -> CollaboratorResult<()> {
        let url = format!(
            "{}/indexes/{}/indexed-assets/{}",
            self.base_url, self.index_id, indexed_asset_id
        );

        loop {
            let response = self
                .client
                .get(&url)
                .header("x-api-key", &self.api_key)
                .send()
                .await
                .map_err(|e| CollaboratorError::request(SERVICE, e))?;

            let asset: IndexedAsset = check_status(SERVICE, response)
                .await?
                .json()
                .await
                .map_err(|e| CollaboratorError::invalid_response(SERVICE, e.to_string()))?;

            debug!(indexed_asset_id, status = %asset.status, "Indexing status");
            match asset.status.as_str() {
                "ready" => return Ok(()),
                "failed" => {
                    return Err(CollaboratorError::invalid_response(
                        SERVICE,
                        "Indexing failed",
                    ))
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    async fn stream_analysis(&self, video_id: &str) -> CollaboratorResult<String> {
        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&AnalyzeRequest {
                video_id,
                prompt: ANALYSIS_PROMPT,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| CollaboratorError::request(SERVICE, e))?;

        let mut stream = check_status(SERVICE, response).await?.bytes_stream();
        let mut collector = TextCollector::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CollaboratorError::request(SERVICE, e))?;
            collector.push(&chunk);
        }

        Ok(collector.finish())
    }
}

#[async_trait]
impl VideoAnalyzer for TwelveLabsAnalyzer {
    async fn analyze(&self, video: &Path) -> CollaboratorResult<String> {
        info!("Uploading {} to TwelveLabs", video.display());
        let asset_id = self.upload_asset(video).await?;

        let indexed_asset_id = self.index_asset(&asset_id).await?;
        info!(asset_id = %asset_id, indexed_asset_id = %indexed_asset_id, "Waiting for indexing");
        self.wait_until_ready(&indexed_asset_id).await?;

        let description = self.stream_analysis(&indexed_asset_id).await?;
        if description.trim().is_empty() {
            return Err(CollaboratorError::invalid_response(
                SERVICE,
                "analysis stream contained no text",
            ));
        }

        debug!(chars = description.len(), "Analysis received");
        Ok(description)
    }
}

/// Concatenates `text_generation` events from a newline-delimited JSON stream.
#[derive(Debug, Default)]
struct TextCollector {
    pending: Vec<u8>,
    text: String,
}

impl TextCollector {
    fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.accept(&line);
        }
    }

    fn accept(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<StreamEvent>(line) {
            Ok(event) if event.event_type == "text_generation" => {
                if let Some(text) = event.text {
                    self.text.push_str(&text);
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping unparseable stream line: {}", e),
        }
    }

    fn finish(mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        self.accept(&rest);
        self.text
    }
}
