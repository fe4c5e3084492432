use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("provider job failed: {0}")]
    JobFailed(String),
    #[error("provider job did not reach a terminal state within {attempts} status checks")]
    JobTimedOut { attempts: u32 },
}

pub type Result<T> = std::result::Result<T, GatewayError>;
