use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Model not downloaded")]
    ModelNotReady,

    #[error("Pipeline load failed: {0}")]
    PipelineLoad(String),

    #[error("Pipeline loading timeout")]
    PipelineTimeout,

    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Negotiation error: {0}")]
    Negotiation(String),

    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
