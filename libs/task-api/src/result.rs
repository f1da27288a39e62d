use reqwest::Error as ReqwestError;
use thiserror::Error;
use url::ParseError as UrlParseError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Network failure, timeout, non-2xx response or an undecodable body.
    #[error("Request error: {0}")]
    Transport(#[from] ReqwestError),

    /// The server does not know the requested resource.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The request was rejected locally and never sent.
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl ClientError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ClientError::Validation(msg.into())
    }
}
