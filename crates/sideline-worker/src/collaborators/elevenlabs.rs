//! ElevenLabs speech and sound-effect client.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use super::{
    check_status, CollaboratorError, CollaboratorResult, CrowdSynthesizer, VoiceSynthesizer,
};
use crate::error::{WorkerError, WorkerResult};

const SERVICE: &str = "elevenlabs";
const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const OUTPUT_FORMAT: &str = "mp3_44100_128";

/// "Chris", the sports commentator voice.
pub const COMMENTATOR_VOICE_ID: &str = "Anr9GtYh2VRXxiPplzxM";
const SPEECH_MODEL: &str = "eleven_multilingual_v2";
const SOUND_MODEL: &str = "eleven_text_to_sound_v2";
const PROMPT_INFLUENCE: f64 = 0.3;

/// Voice tuning, matching the sliders in the ElevenLabs UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.55,
            similarity_boost: 0.85,
            style: 0.35,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct SoundRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    #[serde(rename = "loop")]
    looped: bool,
    duration_seconds: f64,
    prompt_influence: f64,
}

/// Implements both `VoiceSynthesizer` and `CrowdSynthesizer`.
pub struct ElevenLabsClient {
    api_key: String,
    voice_id: String,
    voice_settings: VoiceSettings,
    base_url: String,
    client: Client,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice_id: COMMENTATOR_VOICE_ID.to_string(),
            voice_settings: VoiceSettings::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| WorkerError::config_error("ELEVENLABS_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>, settings: VoiceSettings) -> Self {
        self.voice_id = voice_id.into();
        self.voice_settings = settings;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// POST `body` and write the returned audio to `output`.
    async fn fetch_audio<T: Serialize + Sync>(
        &self,
        url: String,
        body: &T,
        output: &Path,
    ) -> CollaboratorResult<PathBuf> {
        let response = self
            .client
            .post(url)
            .query(&[("output_format", OUTPUT_FORMAT)])
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(body)
            .send()
            .await
            .map_err(|e| CollaboratorError::request(SERVICE, e))?;

        let audio = check_status(SERVICE, response)
            .await?
            .bytes()
            .await
            .map_err(|e| CollaboratorError::request(SERVICE, e))?;

        if audio.is_empty() {
            return Err(CollaboratorError::invalid_response(SERVICE, "empty audio body"));
        }

        tokio::fs::write(output, &audio).await?;
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsClient {
    async fn synthesize_voice(&self, text: &str, output: &Path) -> CollaboratorResult<PathBuf> {
        if text.trim().is_empty() {
            return Err(CollaboratorError::rejected("text must be a non-empty string"));
        }

        info!(voice_id = %self.voice_id, words = text.split_whitespace().count(), "Synthesizing narration");

        let body = SpeechRequest {
            text,
            model_id: SPEECH_MODEL,
            voice_settings: self.voice_settings,
        };
        let url = format!("{}/text-to-speech/{}", self.base_url, self.voice_id);
        self.fetch_audio(url, &body, output).await
    }
}

#[async_trait]
impl CrowdSynthesizer for ElevenLabsClient {
    async fn synthesize_crowd(
        &self,
        prompt: &str,
        duration_secs: f64,
        output: &Path,
    ) -> CollaboratorResult<PathBuf> {
        info!(duration_secs, "Generating crowd ambience");

        let body = SoundRequest {
            text: prompt,
            model_id: SOUND_MODEL,
            looped: false,
            duration_seconds: duration_secs,
            prompt_influence: PROMPT_INFLUENCE,
        };
        let url = format!("{}/sound-generation", self.base_url);
        self.fetch_audio(url, &body, output).await
    }
}
