use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("CSV read/write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("DataFrame operation failed: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

pub type Result<T> = std::result::Result<T, PrepError>;
