use thiserror::Error;

/// Why a raw payload could not be turned into a sensor message.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("payload is not well-formed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("top-level JSON value is not an object")]
    NotAnObject,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("submission rejected: {0}")]
    Submission(String),

    #[error("subscribe rejected for topic '{topic}': {reason}")]
    Subscription { topic: String, reason: String },

    #[error("transport connection fault: {0}")]
    ConnectionFault(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] anyhow::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
