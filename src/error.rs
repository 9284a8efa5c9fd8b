use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("state out of range: {0}")]
    InvalidStateRange(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid value table key '{0}'")]
    InvalidKey(String),

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
