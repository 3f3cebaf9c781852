//! Gemini commentary script writer.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{check_status, CollaboratorError, CollaboratorResult, ScriptRequest, ScriptWriter};
use crate::error::{WorkerError, WorkerResult};

const SERVICE: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// `ScriptWriter` backed by Gemini `generateContent`.
pub struct GeminiScriptWriter {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiScriptWriter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::config_error("GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Persona and length instructions for the commentator.
fn system_instruction(request: &ScriptRequest) -> String {
    let mut instruction = format!(
        "You are an extremely excited and hyped sports commentator. \
         Given a timestamped description of a trickshot, say what you would say live as it happens, \
         matching your words to the moments in the description. \
         Use at most {} words. Be short, concise and straightforward, but excited. \
         Do not mention timestamps, do not use asterisks or stage directions, \
         and reply with the spoken commentary only as one short paragraph. \
         Speak in {}.",
        request.max_words,
        request.language.display_name(),
    );

    if let Some(name) = &request.display_name {
        instruction.push_str(&format!(
            " The player's name is {}; call them by name at least once.",
            name
        ));
    }

    instruction
}

#[async_trait]
impl ScriptWriter for GeminiScriptWriter {
    async fn write_script(&self, request: &ScriptRequest) -> CollaboratorResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: system_instruction(request),
                }],
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: request.description.clone(),
                }],
            }],
        };

        info!(
            model = %self.model,
            max_words = request.max_words,
            language = request.language.code(),
            "Requesting commentary script"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::request(SERVICE, e.without_url()))?;

        let response: GenerateResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::invalid_response(SERVICE, e.to_string()))?;

        let text = response_text(response)
            .ok_or_else(|| CollaboratorError::invalid_response(SERVICE, "No content in Gemini response"))?;

        debug!(chars = text.len(), "Script received");
        Ok(text)
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(response: GenerateResponse) -> Option<String> {
    let parts = response.candidates.into_iter().next()?.content?.parts;
    let text: String = parts.into_iter().map(|p| p.text).collect();
    (!text.trim().is_empty()).then_some(text)
}
