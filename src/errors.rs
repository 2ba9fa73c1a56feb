//! The single error shape reported by every media storage operation.

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

use crate::transport::TransportError;

/// Coarse classification of a [`MediaStorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No access token is held; `connect` has not succeeded yet.
    Unauthenticated,
    /// The request never produced a response.
    TransportFailure,
    /// The service answered with a status outside `200..300`.
    HttpStatusFailure,
    /// The service answered 2xx but the body did not have the expected shape.
    MalformedResponse,
    /// A caller-supplied argument was rejected before any request was sent.
    InvalidParameter,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::TransportFailure => "transport failure",
            ErrorKind::HttpStatusFailure => "http status failure",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::InvalidParameter => "invalid parameter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MediaStorageError {
    #[error("wrong usage: use the connect method to get an access token")]
    Unauthenticated,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("received error ({status}): {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("invalid response ({status}): {body}")]
    MalformedResponse { status: StatusCode, body: String },
}

pub type MediaResult<T> = Result<T, MediaStorageError>;

impl MediaStorageError {
    /// Shortcut for a client-side validation failure.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Build a status failure, keeping the raw body text.
    pub fn http_status(status: StatusCode, body: &[u8]) -> Self {
        Self::HttpStatus {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Build a decode failure, keeping the raw body text.
    pub fn malformed(status: StatusCode, body: &[u8]) -> Self {
        Self::MalformedResponse {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::HttpStatus { .. } => ErrorKind::HttpStatusFailure,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    /// HTTP status of the response that caused the error, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } | Self::MalformedResponse { status, .. } => {
                Some(status.as_u16())
            }
            _ => None,
        }
    }

    /// Human readable detail. For status and decode failures this is the raw
    /// response body.
    pub fn message(&self) -> String {
        match self {
            Self::HttpStatus { body, .. } | Self::MalformedResponse { body, .. } => body.clone(),
            Self::InvalidParameter(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
