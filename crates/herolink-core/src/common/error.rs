//! Error types for the HeroService RPC boundary.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure on either side of the wire, and its mapping to and
//! from [`WireError`], the response-carried representation.
//!
//! ## Error cases
//! - `Schema`: unknown service/method at resolution time - a startup or
//!   configuration defect on the resolving side.
//! - `UnknownService`: the client asked for a service the loaded schema does
//!   not define - fatal to that resolution attempt.
//! - `MethodNotFound`, `MalformedRequest`, `Handler`, `ServiceShutdown`:
//!   per-call server-side outcomes, returned to the caller inside the
//!   response frame and never fatal to the server process.
//! - `Transport`, `DeadlineExceeded`: per-call client-side outcomes.
//!
//! The dispatcher converts all handler and routing failures into a
//! response-carried error rather than terminating its listener; the client
//! stub converts every failure kind into a caller-visible result and never
//! retries on its own.

use crate::frame::{ErrorKind, WireError};
use crate::schema::SchemaError;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the HeroService RPC boundary.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Name resolution against the loaded schema failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The client requested a stub for a service the schema does not define.
    #[error("unknown service: {name}")]
    UnknownService { name: String },

    /// The call named a (service, method) pair with no registered route.
    #[error("method not found: {route}")]
    MethodNotFound { route: String },

    /// The request payload could not be decoded into the declared shape.
    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },

    /// The handler ran and reported a failure; the detail is preserved.
    #[error("handler error: {message}")]
    Handler { message: String },

    /// The call arrived while the dispatcher was draining for shutdown.
    #[error("service is shutting down")]
    ServiceShutdown,

    /// Connection-level failure: connect, send, receive, or driver loss.
    #[error("transport error: {context}")]
    Transport { context: String },

    /// The caller's per-call time budget elapsed before a response arrived.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport {
            context: err.to_string(),
        }
    }
}

/// Server-to-wire conversion for the response-carried subset.
///
/// Anything outside the four wire kinds collapses to `HandlerError` with its
/// display text, so a caller always sees the failure detail even if the
/// server produced an unexpected variant.
impl From<&Error> for WireError {
    fn from(err: &Error) -> Self {
        let (kind, message) = match err {
            Error::Handler { message } => (ErrorKind::HandlerError, message.clone()),
            Error::MethodNotFound { route } => (ErrorKind::MethodNotFound, route.clone()),
            Error::MalformedRequest { reason } => (ErrorKind::MalformedRequest, reason.clone()),
            Error::ServiceShutdown => (ErrorKind::ServiceShutdown, String::new()),
            other => (ErrorKind::HandlerError, other.to_string()),
        };
        WireError {
            kind: kind as i32,
            message,
        }
    }
}

/// Wire-to-client conversion: the stub propagates server-signaled errors to
/// its caller unchanged in kind and detail.
impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        match err.error_kind() {
            ErrorKind::MethodNotFound => Error::MethodNotFound { route: err.message },
            ErrorKind::MalformedRequest => Error::MalformedRequest { reason: err.message },
            ErrorKind::ServiceShutdown => Error::ServiceShutdown,
            ErrorKind::HandlerError => Error::Handler { message: err.message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carried_errors_survive_the_wire() {
        let cases = [
            Error::MethodNotFound {
                route: "HeroService/Vanish".into(),
            },
            Error::MalformedRequest {
                reason: "missing id".into(),
            },
            Error::Handler {
                message: "no hero with id 999".into(),
            },
            Error::ServiceShutdown,
        ];

        for err in cases {
            let wire = WireError::from(&err);
            let back = Error::from(wire);
            assert_eq!(back.to_string(), err.to_string());
        }
    }

    #[test]
    fn handler_detail_crosses_without_display_prefix() {
        let err = Error::Handler {
            message: "no hero with id 7".into(),
        };
        let wire = WireError::from(&err);
        assert_eq!(wire.message, "no hero with id 7");
        assert!(
            matches!(Error::from(wire), Error::Handler { ref message } if message == "no hero with id 7")
        );
    }

    #[test]
    fn client_local_errors_collapse_to_handler_kind() {
        let err = Error::DeadlineExceeded;
        let wire = WireError::from(&err);
        assert_eq!(wire.error_kind(), ErrorKind::HandlerError);
        assert_eq!(wire.message, "deadline exceeded");
    }
}
