//! Commentary requests.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::Language;

/// Routing key of a live progress client.
///
/// Chosen by the client before it submits, and independent of the job id
/// the service assigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a caller supplies when submitting a clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommentaryRequest {
    /// Source video on local disk
    pub video: PathBuf,
    #[serde(default)]
    pub language: Language,
    /// Optional player name for the commentator to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Id a live client subscribed with before submitting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<SubscriberId>,
}

impl CommentaryRequest {
    pub fn new(video: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            language: Language::default(),
            display_name: None,
            subscriber: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Set the display name. Blank names are ignored.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        self.display_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_subscriber(mut self, subscriber: SubscriberId) -> Self {
        self.subscriber = Some(subscriber);
        self
    }
}
