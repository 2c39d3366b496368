use thiserror::Error;

pub type LogFlowResult<T> = Result<T, LogFlowError>;

#[derive(Error, Debug)]
pub enum LogFlowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("File watch error: {0}")]
    Watch(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
