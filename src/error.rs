//! Error types for confab

use thiserror::Error;

/// Result type alias for confab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the conversation loop
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech recognition error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech synthesis error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
