//! Error types for the echo service and its clients.
//!
//! This module defines the central `Error` enum. Every failure is constructed
//! at the site where it happens and carries the context needed to act on it
//! (the offending field, the configured limit, the transport's message). It
//! implements `From<Error>` for `tonic::Status` and the reverse conversion so
//! that the error kind survives a round trip over gRPC.
//!
//! ## Error Cases
//! - `Transport`: The call primitive failed (connection reset, unreachable
//!   peer, unexpected status).
//! - `Cancelled`: The caller cancelled before the call completed.
//! - `DeadlineExceeded`: The caller's own deadline elapsed.
//! - `Timeout`: The service-side ceiling elapsed inside the handler.
//! - `InvalidRequest`: The request was rejected by validation.
//! - `Internal`: The handler failed unexpectedly (e.g. panicked).
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use core::time::Duration;
use tonic::{Code, Status, metadata::MetadataMap};

pub type Result<T> = core::result::Result<T, Error>;

/// Metadata key carrying the service ceiling (in milliseconds) on a
/// `DEADLINE_EXCEEDED` status produced by [`Error::Timeout`].
const TIMEOUT_LIMIT_KEY: &str = "x-echo-timeout-ms";
/// Metadata key carrying the rejected field on an `INVALID_ARGUMENT` status.
const INVALID_FIELD_KEY: &str = "x-echo-invalid-field";

/// Unified error type for echo calls.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Failure observed from the call primitive.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The caller cancelled the request.
    #[error("Request cancelled by caller")]
    Cancelled,

    /// The caller's deadline elapsed before the request completed.
    #[error("Caller deadline exceeded")]
    DeadlineExceeded,

    /// The service-side ceiling elapsed before the request completed.
    #[error("Request timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The request was rejected by validation.
    #[error("Invalid request: {field}: {reason}")]
    InvalidRequest { field: String, reason: String },

    #[error("Internal error: {context}")]
    Internal { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

/// Coarse classification of an [`Error`], by origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    /// Caller-driven: explicit cancellation or the caller's own deadline.
    Cancellation,
    /// Local ceiling enforced by the service.
    Timeout,
    Validation,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Cancellation => "cancellation",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::ServiceShutdown => ErrorKind::Transport,
            Self::Cancelled | Self::DeadlineExceeded => ErrorKind::Cancellation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidRequest { .. } => ErrorKind::Validation,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Transport { context } => Status::unavailable(context),
            Error::Cancelled => Status::cancelled("Request was cancelled"),
            Error::DeadlineExceeded => Status::deadline_exceeded("Caller deadline exceeded"),
            Error::Timeout { limit } => {
                let mut md = MetadataMap::new();
                // Millisecond values are ASCII digits and always parse.
                if let Ok(value) = limit.as_millis().to_string().parse() {
                    md.insert(TIMEOUT_LIMIT_KEY, value);
                }
                Status::with_metadata(
                    Code::DeadlineExceeded,
                    format!("Request timed out after {limit:?}"),
                    md,
                )
            }
            Error::InvalidRequest { field, reason } => {
                let mut md = MetadataMap::new();
                if let Ok(value) = field.parse() {
                    md.insert(INVALID_FIELD_KEY, value);
                }
                Status::with_metadata(Code::InvalidArgument, reason, md)
            }
            Error::Internal { context } => Status::internal(context),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        let md = status.metadata();
        match status.code() {
            Code::Cancelled => Error::Cancelled,
            Code::DeadlineExceeded => match md
                .get(TIMEOUT_LIMIT_KEY)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
            {
                Some(ms) => Error::Timeout {
                    limit: Duration::from_millis(ms),
                },
                None => Error::DeadlineExceeded,
            },
            Code::InvalidArgument => Error::InvalidRequest {
                field: md
                    .get(INVALID_FIELD_KEY)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("request")
                    .to_string(),
                reason: status.message().to_string(),
            },
            Code::Internal => Error::Internal {
                context: status.message().to_string(),
            },
            _ => Error::Transport {
                context: format!("{:?}: {}", status.code(), status.message()),
            },
        }
    }
}
