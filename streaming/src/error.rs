//! Streaming error taxonomy (spec §7).

#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("stream timed out")]
    Timeout,
    #[error("stream cancelled")]
    Cancelled,
    #[error("suspense boundary '{0}' failed: {1}")]
    SuspenseFailure(String, String),
}

pub type StreamingResult<T> = Result<T, StreamingError>;
