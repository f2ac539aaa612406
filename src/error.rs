use reqwest::{header::HeaderMap, StatusCode};

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Final non-retried response, with whatever body text could be read.
    #[error(transparent)]
    Response(Box<HttpResponseError>),
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// The backoff wait was interrupted before the next attempt.
    #[error("interrupted while waiting to retry")]
    Interrupted,
    /// A `Location` header that cannot be applied to the current endpoint.
    #[error("invalid redirect location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },
    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HttpError {
    /// Status code of the failed response, if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response(err) => Some(err.status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

impl From<HttpResponseError> for HttpError {
    fn from(err: HttpResponseError) -> Self {
        Self::Response(Box::new(err))
    }
}

/// Describes the last failed attempt of a command.
#[derive(Debug, thiserror::Error)]
#[error(
    "command: {request_line} failed with response: {status_line}; content: [{}]",
    .content.as_deref().unwrap_or_default()
)]
pub struct HttpResponseError {
    pub request_line: String,
    pub status_line: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Response body text; `None` when there was no body or it could not be read.
    pub content: Option<String>,
}
