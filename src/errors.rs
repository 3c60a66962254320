// ABOUTME: Error types for the deckfit engine
// ABOUTME: Provides structured error handling for each stage of the build, audit and patch pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Failed to read or write file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Invalid JSON input: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Markup parse error at byte {position}: {message}")]
    MarkupError { position: usize, message: String },

    #[error("Lesson parse error: {0}")]
    LessonError(String),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Path not found: {0}")]
    PathNotFoundError(PathBuf),

    #[error("No markup files found matching pattern: {0}")]
    NoFilesFoundError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

// Implement conversion from anyhow::Error to our DeckError
impl From<anyhow::Error> for DeckError {
    fn from(err: anyhow::Error) -> Self {
        DeckError::UnknownError(err.to_string())
    }
}

impl From<glob::PatternError> for DeckError {
    fn from(err: glob::PatternError) -> Self {
        DeckError::ValidationError(format!("Invalid glob pattern: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
