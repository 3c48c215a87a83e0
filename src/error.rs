//! Error types for webpodcast

use std::io;
use thiserror::Error;

/// Main error type for webpodcast
#[derive(Error, Debug)]
pub enum PodcastError {
    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Not supported by this speech backend: {0}")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("Dialogue generation error: {0}")]
    Generation(String),

    #[error("Not enough content to convert ({length} characters, need at least {minimum})")]
    InsufficientContent { length: usize, minimum: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for webpodcast operations
pub type Result<T> = std::result::Result<T, PodcastError>;
