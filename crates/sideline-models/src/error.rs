//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("Unknown stage ordinal: {0}")]
    UnknownStage(u8),
}
