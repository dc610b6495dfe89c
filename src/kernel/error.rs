use std::time::Duration;

use thiserror::Error;

/// Everything that can end a job. All of these are terminal for the job that
/// hit them; retrying is a new start from the user.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    #[error("No API key")]
    Configuration,
    #[error("API key invalid or no credits: {0}")]
    Quota(String),
    #[error("A job is already in progress")]
    Busy,
    #[error("{0}")]
    Precondition(String),
    #[error("Failed to encode selected segment as WAV: {0}")]
    Encode(String),
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error("Submission rejected: {0}")]
    Submission(String),
    #[error("Lost contact with the service while polling: {0}")]
    PollTransport(String),
    #[error("{0}")]
    Remote(String),
    #[error("Gave up waiting for the result after {0:?}")]
    Timeout(Duration),
    #[error("No audio URL in result")]
    MissingResult,
    #[error("No audio received: {0}")]
    NoAudio(String),
    #[error("Failed to decode audio: {0}")]
    Decode(String),
    #[error("Job cancelled")]
    Cancelled,
}
