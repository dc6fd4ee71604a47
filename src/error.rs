use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlitzerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("{service} API returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("blitz.io login failed: {0}")]
    Login(String),

    #[error("Rush {job_id} failed: {reason}")]
    RushFailed { job_id: String, reason: String },

    #[error("Rush {job_id} finished without any timeline points")]
    EmptyTimeline { job_id: String },

    #[error("Timed out after {attempts} polls waiting for {expected} dyno(s) to come up")]
    ReadinessTimeout { expected: u32, attempts: u32 },

    #[error("Invalid load pattern: {0}")]
    Pattern(String),
}

pub type Result<T> = std::result::Result<T, BlitzerError>;

/// Turn a non-2xx response into [`BlitzerError::Api`], keeping the body for the message.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BlitzerError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
