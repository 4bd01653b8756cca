//! Call frame envelope and framing codec.
//!
//! Every call is one [`RequestFrame`] answered by at most one
//! [`ResponseFrame`]. Frames are protobuf-encoded and travel length-delimited
//! over TCP; [`frame_codec`] builds the codec both ends must construct with
//! the same limits.
//!
//! Correlation is by `call_id`, not arrival order: concurrent calls on one
//! connection may complete in any order, and each response carries the id of
//! the request it answers.

use crate::error::Error;
use bytes::Bytes;
use tokio_util::codec::LengthDelimitedCodec;

/// Default upper bound on a single encoded frame (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// One remote call, as it travels client to server.
///
/// `payload` is the prost-encoded request message declared by the schema for
/// `(service, method)`. A `deadline_ms` of zero means the caller forwarded no
/// deadline.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestFrame {
    #[prost(uint64, tag = "1")]
    pub call_id: u64,
    #[prost(string, tag = "2")]
    pub service: String,
    #[prost(string, tag = "3")]
    pub method: String,
    #[prost(uint64, tag = "4")]
    pub deadline_ms: u64,
    #[prost(bytes = "bytes", tag = "5")]
    pub payload: ::prost::bytes::Bytes,
}

/// The answer to one [`RequestFrame`].
///
/// Exactly one of `payload` and `error` is meaningful: a present `error`
/// marks failure and `payload` is empty; otherwise `payload` holds the
/// prost-encoded response message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseFrame {
    #[prost(uint64, tag = "1")]
    pub call_id: u64,
    #[prost(bytes = "bytes", tag = "2")]
    pub payload: ::prost::bytes::Bytes,
    #[prost(message, optional, tag = "3")]
    pub error: Option<WireError>,
}

impl ResponseFrame {
    /// A successful response carrying an encoded message.
    pub fn success(call_id: u64, payload: Bytes) -> Self {
        Self {
            call_id,
            payload,
            error: None,
        }
    }

    /// A failed response carrying the error's wire representation.
    pub fn failure(call_id: u64, error: &Error) -> Self {
        Self {
            call_id,
            payload: Bytes::new(),
            error: Some(WireError::from(error)),
        }
    }
}

/// Response-carried error: kind plus human-readable detail.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireError {
    #[prost(enumeration = "ErrorKind", tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl WireError {
    /// Decodes the stored kind, treating unknown values as `HandlerError` so
    /// a newer peer's kinds still surface their detail text.
    pub fn error_kind(&self) -> ErrorKind {
        ErrorKind::try_from(self.kind).unwrap_or(ErrorKind::HandlerError)
    }
}

/// The error kinds a server may carry back in a response frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorKind {
    /// The handler ran and failed; `message` preserves the detail.
    HandlerError = 0,
    /// No route matched the frame's (service, method) pair.
    MethodNotFound = 1,
    /// The payload did not decode into the declared request shape.
    MalformedRequest = 2,
    /// The dispatcher refused the call while draining for shutdown.
    ServiceShutdown = 3,
}

/// Builds the length-delimited codec used on both sides of the connection.
///
/// `max_frame_bytes` bounds a single encoded frame; oversized frames are a
/// transport error, not a truncation.
pub fn frame_codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_bytes)
        .new_codec()
}
