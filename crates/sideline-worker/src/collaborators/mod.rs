//! External services the pipeline depends on.
//!
//! Each service sits behind a small trait so the pipeline can be driven by
//! mocks. The HTTP clients in the submodules are the production
//! implementations.

mod elevenlabs;
mod gemini;
mod twelvelabs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sideline_models::Language;
use thiserror::Error;

use crate::error::WorkerResult;

pub use elevenlabs::{ElevenLabsClient, VoiceSettings};
pub use gemini::GeminiScriptWriter;
pub use twelvelabs::TwelveLabsAnalyzer;

/// Prompt for the crowd ambience track.
pub const CROWD_PROMPT: &str = "Background audio of a crowded basketball arena as heard through a TV broadcast. \
Include cheering, clapping, chanting, and natural crowd reactions. No narration or music.";

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// A collaborator call failed. The service's own message is kept verbatim.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response was unusable: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    pub fn request(service: &'static str, message: impl ToString) -> Self {
        Self::Request {
            service,
            message: message.to_string(),
        }
    }

    pub fn api(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            service,
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(service: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// The input was refused before any call was made.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Inputs to the script writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    /// Analyzer output, passed through untouched
    pub description: String,
    pub max_words: usize,
    pub language: Language,
    pub display_name: Option<String>,
}

/// Video understanding.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Describe what happens in the clip.
    async fn analyze(&self, video: &Path) -> CollaboratorResult<String>;
}

/// Commentary text generation.
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    /// Raw commentary. Length is advisory; callers trim it.
    async fn write_script(&self, request: &ScriptRequest) -> CollaboratorResult<String>;
}

/// Text-to-speech.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Speak `text` into an audio file at `output`.
    async fn synthesize_voice(&self, text: &str, output: &Path) -> CollaboratorResult<PathBuf>;
}

/// Ambience sound generation.
#[async_trait]
pub trait CrowdSynthesizer: Send + Sync {
    /// Generate roughly `duration_secs` of audio for `prompt` at `output`.
    async fn synthesize_crowd(
        &self,
        prompt: &str,
        duration_secs: f64,
        output: &Path,
    ) -> CollaboratorResult<PathBuf>;
}

/// The four collaborators a pipeline runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub writer: Arc<dyn ScriptWriter>,
    pub voice: Arc<dyn VoiceSynthesizer>,
    pub crowd: Arc<dyn CrowdSynthesizer>,
}

impl Collaborators {
    /// Production clients configured from the environment.
    pub fn from_env() -> WorkerResult<Self> {
        let elevenlabs = Arc::new(ElevenLabsClient::from_env()?);

        Ok(Self {
            analyzer: Arc::new(TwelveLabsAnalyzer::from_env()?),
            writer: Arc::new(GeminiScriptWriter::from_env()?),
            voice: elevenlabs.clone(),
            crowd: elevenlabs,
        })
    }
}

/// Turn a non-success response into `CollaboratorError::Api` with its body.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> CollaboratorResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::api(service, status.as_u16(), body))
}
