//! Method handler trait and payload decoding.
//!
//! A [`MethodHandler`] implements the business logic of exactly one method
//! of one service. Handlers receive the raw request payload, decode it into
//! the shape the schema declares for their method, and return an encoded
//! response or an error. They hold no per-call mutable state and must not
//! touch the schema descriptor; anything they need beyond the request comes
//! from collaborators captured at construction time.
//!
//! The dispatcher invokes exactly one handler per call and converts whatever
//! the handler returns into a response frame; it never retries or suppresses
//! handler failures.

use async_trait::async_trait;
use bytes::Bytes;
use herolink_core::types::ShapedMessage;
use herolink_core::{Error, Result};

/// Business logic for one (service, method) route.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Processes one decoded-and-validated request payload.
    ///
    /// # Errors
    ///
    /// Any error becomes a response-carried failure for this call only; the
    /// listener keeps serving.
    async fn handle(&self, payload: Bytes) -> Result<Bytes>;

    /// Short name for logging, e.g. `"FindOneHandler"`.
    fn name(&self) -> &'static str;
}

/// Decodes a request payload into its declared shape.
///
/// # Errors
///
/// Returns [`Error::MalformedRequest`] when the payload does not decode;
/// the handler proper is never invoked on such payloads.
pub fn decode_request<T: ShapedMessage>(payload: Bytes) -> Result<T> {
    T::decode(payload).map_err(|err| Error::MalformedRequest {
        reason: err.to_string(),
    })
}
