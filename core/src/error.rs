//! Error types for the API pipeline.
//!
//! # Design
//! One enum covers every stage. A fault produced at any point (transport,
//! decoding, a middleware, config lookup) is returned to the caller as-is,
//! with no re-wrapping as it moves between stages. Middlewares may return any
//! variant; `Middleware` exists for faults that have no better home.

use thiserror::Error;

use crate::config::Environment;

/// Errors returned by the request pipeline.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with anything other than 200.
    #[error("Got unexpected status code {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body could not be deserialized into the expected model.
    #[error("deserialization failed: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The body parsed but failed the model's own validation.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Raised by a registered middleware.
    #[error("middleware fault: {0}")]
    Middleware(String),

    /// No base URL is configured for the selected environment.
    #[error("no endpoint configured for environment `{0}`")]
    UnknownEnvironment(Environment),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The network call itself failed (connect, DNS, I/O).
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Shorthand for middleware implementations.
    pub fn middleware(message: impl Into<String>) -> Self {
        ApiError::Middleware(message.into())
    }

    /// HTTP status carried by an `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}
