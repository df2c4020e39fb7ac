use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Decision service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
