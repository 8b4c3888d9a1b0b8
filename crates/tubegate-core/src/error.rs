use thiserror::Error;

#[derive(Error, Debug)]
pub enum TubegateError {
    #[error("No valid videos detected")]
    EmptyDetection,

    #[error("Malformed detection payload: {reason}")]
    MalformedDetection { reason: String },

    #[error("Filter request failed: HTTP {status}")]
    FilterHttp { status: u16 },

    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, TubegateError>;
