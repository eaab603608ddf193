use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushoverError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Pushover API error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Pushover rejected the notification: {}", errors.join(", "))]
    Rejected { errors: Vec<String> },
}

pub type PushoverResult<T> = Result<T, PushoverError>;
