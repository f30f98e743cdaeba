use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Source read error: {0}")]
    SourceRead(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for EtlError {
    fn from(err: polars::error::PolarsError) -> Self {
        EtlError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
